//! Error types for prosody-analytics

use thiserror::Error;

/// Result type alias for analytics and storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the store and configuration layers.
///
/// Empty scopes are never errors: aggregations return empty results instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from libSQL.
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data in the database.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Append targeted a learner that has no record yet.
    #[error("learner not found: {0}")]
    LearnerNotFound(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
