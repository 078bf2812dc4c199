pub mod config;
pub mod query;
pub mod record;

use std::sync::Arc;

use anyhow::{Context, Result};
use prosody_analytics::{AnalyticsConfig, LearnerAnalytics, TursoStore};
use serde::Serialize;
use tracing::debug;

/// Open the configured learner store behind the analytics facade.
pub async fn open(config: &AnalyticsConfig) -> Result<LearnerAnalytics> {
    let path = &config.storage.db_path;
    debug!(db = %path.display(), "opening learner store");
    let store = TursoStore::new_local(path)
        .await
        .with_context(|| format!("Failed to open learner store at {}", path.display()))?;
    Ok(LearnerAnalytics::new(Arc::new(store), config.clone()))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
