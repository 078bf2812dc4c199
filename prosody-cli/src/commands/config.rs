use anyhow::Result;
use clap::{Args, Subcommand};
use prosody_analytics::AnalyticsConfig;

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show the user configuration file path
    Path,
}

pub fn run(args: ConfigArgs, config: &AnalyticsConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigCommands::Path => {
            println!("User config: {:?}", ConfigLoader::user_config_path());
            Ok(())
        }
    }
}
