//! Configuration for the analytics engine.
//!
//! Thresholds that decide target versus familiar tokens live in one place and
//! are handed to the classification rules explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Confidence threshold used for most content types.
pub const DEFAULT_THRESHOLD: f64 = 0.90;

/// Confidence threshold for word-level content.
pub const WORD_THRESHOLD: f64 = 0.75;

/// Sessions with fewer records are not trusted for milestone calculation.
pub const DEFAULT_MIN_RECORDS_FOR_MILESTONE: usize = 3;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub rollup: RollupConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Target/familiarity cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Threshold for char, sentence and paragraph content (default: 0.90)
    pub default_threshold: f64,
    /// Threshold for word content (default: 0.75)
    pub word_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            word_threshold: WORD_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Pick the threshold for a content type; "word" matches case-insensitively.
    pub fn for_content_type(&self, content_type: Option<&str>) -> f64 {
        match content_type {
            Some(kind) if kind.eq_ignore_ascii_case("word") => self.word_threshold,
            _ => self.default_threshold,
        }
    }
}

/// Session rollup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// Minimum records per session when calculating milestones (default: 3)
    pub min_records_for_milestone: usize,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            min_records_for_milestone: DEFAULT_MIN_RECORDS_FOR_MILESTONE,
        }
    }
}

/// Where the learner database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prosody/learners.db");
        Self { db_path }
    }
}

impl AnalyticsConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}
