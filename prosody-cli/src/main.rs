use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "prosody", about = "Pronunciation analytics for prosody learners")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config file when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learner database path, overriding the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record sessions, milestones, feedback and reference tokens
    Record(commands::record::RecordArgs),
    /// Run analytics queries
    Query(commands::query::QueryArgs),
    /// Inspect configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load(cli.config.as_deref(), cli.db)?;

    match cli.command {
        Commands::Record(args) => commands::record::run(args, &config).await,
        Commands::Query(args) => commands::query::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "prosody",
            "query",
            "rollup",
            "--user",
            "u1",
            "--db",
            "/tmp/learners.db",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/learners.db")));
        assert!(matches!(cli.command, Commands::Query(_)));
    }

    #[test]
    fn config_flag_is_optional() {
        let cli = Cli::try_parse_from(["prosody", "config", "show"]).unwrap();

        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["prosody"]).is_err());
    }
}
