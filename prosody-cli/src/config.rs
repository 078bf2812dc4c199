//! Configuration file lookup for the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use prosody_analytics::AnalyticsConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `explicit`, else the user config file if it
    /// exists, else defaults. `db_override` replaces the store path.
    pub fn load(explicit: Option<&Path>, db_override: Option<PathBuf>) -> Result<AnalyticsConfig> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::user_config_path().filter(|path| path.exists()),
        };

        let mut config = match path {
            Some(path) => AnalyticsConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => AnalyticsConfig::default(),
        };

        if let Some(db) = db_override {
            config.storage.db_path = db;
        }
        Ok(config)
    }

    /// User config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("prosody").join("config.toml"))
    }
}
