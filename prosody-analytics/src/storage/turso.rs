//! Turso/libSQL implementation of learner storage.
//!
//! Sessions are stored one row per append with the full entry serialized as
//! JSON, alongside the columns queries filter on. An autoincrement `seq`
//! column preserves insertion order for every table.
//!
//! All statements go through one shared connection behind an async mutex, so
//! writes are serialized and multi-statement reads see a single snapshot.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use super::{FeedbackStore, LearnerStore, ReferenceStore};
use crate::error::{Error, Result};
use crate::model::{FeedbackEntry, LearnerRecord, MilestoneEntry, Session, TokenMapping};

const SCHEMA_LEARNERS: &str = r#"
CREATE TABLE IF NOT EXISTS learners (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
)
"#;

const SCHEMA_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    sub_session_id TEXT,
    body TEXT NOT NULL
)
"#;

const SCHEMA_MILESTONES: &str = r#"
CREATE TABLE IF NOT EXISTS milestones (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    sub_session_id TEXT,
    milestone_level TEXT NOT NULL,
    sub_milestone_level TEXT,
    created_at TEXT NOT NULL
)
"#;

const SCHEMA_FEEDBACK: &str = r#"
CREATE TABLE IF NOT EXISTS feedback (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    token TEXT NOT NULL,
    feedback INTEGER NOT NULL,
    UNIQUE (user_id, session_id, token)
)
"#;

const SCHEMA_TOKEN_MAPPINGS: &str = r#"
CREATE TABLE IF NOT EXISTS token_mappings (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    language TEXT NOT NULL,
    token TEXT NOT NULL,
    hexcode TEXT
)
"#;

/// Wait on locks held by other processes sharing the database file.
const PRAGMA_BUSY_TIMEOUT: &str = "PRAGMA busy_timeout = 5000;";

const INDEX_SESSIONS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, seq)";
const INDEX_SESSIONS_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_session ON sessions(session_id)";
const INDEX_SESSIONS_SUB_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_sub_session ON sessions(sub_session_id)";

/// Turso-backed learner storage.
#[derive(Clone)]
pub struct TursoStore {
    _db: Arc<Database>,
    conn: Arc<Mutex<Connection>>,
}

impl TursoStore {
    /// Open (or create) a local embedded database at `path`.
    pub async fn new_local(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.execute_batch(PRAGMA_BUSY_TIMEOUT).await?;
        info!(path = %path.display(), "opened learner store");
        let store = Self {
            _db: Arc::new(db),
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn().await;
        for statement in [
            SCHEMA_LEARNERS,
            SCHEMA_SESSIONS,
            SCHEMA_MILESTONES,
            SCHEMA_FEEDBACK,
            SCHEMA_TOKEN_MAPPINGS,
            INDEX_SESSIONS_USER,
            INDEX_SESSIONS_SESSION,
            INDEX_SESSIONS_SUB_SESSION,
        ] {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    /// Load a learner's full record, sessions and milestones in append order.
    async fn load_record(conn: &Connection, user_id: &str) -> Result<LearnerRecord> {
        let mut record = LearnerRecord::new(user_id);

        let mut rows = conn
            .query(
                "SELECT body FROM sessions WHERE user_id = ? ORDER BY seq ASC",
                [user_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            record.sessions.push(serde_json::from_str(&body)?);
        }

        let mut rows = conn
            .query(
                "SELECT session_id, sub_session_id, milestone_level, sub_milestone_level, created_at FROM milestones WHERE user_id = ? ORDER BY seq ASC",
                [user_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            record.milestones.push(Self::parse_milestone(&row)?);
        }

        Ok(record)
    }

    /// Load the records of every learner whose id the query returns.
    async fn load_matching(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<LearnerRecord>> {
        let conn = self.conn().await;
        let tx = conn.transaction().await?;
        let mut rows = tx.query(sql, params).await?;

        let mut user_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            user_ids.push(row.get::<String>(0)?);
        }
        drop(rows);

        let mut records = Vec::with_capacity(user_ids.len());
        for user_id in &user_ids {
            records.push(Self::load_record(&tx, user_id).await?);
        }
        tx.commit().await?;
        Ok(records)
    }

    fn parse_milestone(row: &libsql::Row) -> Result<MilestoneEntry> {
        let session_id: String = row.get(0)?;
        let sub_session_id: Option<String> = row.get(1)?;
        let milestone_level: String = row.get(2)?;
        let sub_milestone_level: Option<String> = row.get(3)?;
        let created_at_str: String = row.get(4)?;

        Ok(MilestoneEntry {
            session_id,
            sub_session_id,
            milestone_level,
            sub_milestone_level,
            created_at: parse_datetime(&created_at_str)?,
        })
    }

    fn parse_feedback(row: &libsql::Row) -> Result<FeedbackEntry> {
        Ok(FeedbackEntry {
            user_id: row.get(0)?,
            session_id: row.get(1)?,
            token: row.get(2)?,
            feedback: row.get(3)?,
        })
    }

    async fn query_feedback(&self, sql: &str, key: &str) -> Result<Vec<FeedbackEntry>> {
        let conn = self.conn().await;
        let mut rows = conn.query(sql, [key]).await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_feedback(&row)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl LearnerStore for TursoStore {
    #[instrument(skip(self, session), fields(session_id = %session.session_id), level = "debug")]
    async fn append_session(&self, user_id: &str, session: &Session) -> Result<()> {
        let body = serde_json::to_string(session)?;

        // Learner creation and the session row commit together or not at all.
        let conn = self.conn().await;
        let tx = conn.transaction().await?;
        let created = tx
            .execute(
                "INSERT INTO learners (user_id, created_at) VALUES (?, ?) ON CONFLICT(user_id) DO NOTHING",
                libsql::params![user_id.to_string(), format_datetime(Utc::now())],
            )
            .await?;
        if created > 0 {
            debug!(user_id, "creating learner record");
        }

        tx.execute(
            "INSERT INTO sessions (user_id, session_id, sub_session_id, body) VALUES (?, ?, ?, ?)",
            libsql::params![
                user_id.to_string(),
                session.session_id.clone(),
                session.sub_session_id.clone(),
                body
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, entry), level = "debug")]
    async fn append_milestone(&self, user_id: &str, entry: &MilestoneEntry) -> Result<()> {
        let conn = self.conn().await;
        let inserted = conn
            .execute(
                "INSERT INTO milestones (user_id, session_id, sub_session_id, milestone_level, sub_milestone_level, created_at) \
                 SELECT ?, ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM learners WHERE user_id = ?)",
                libsql::params![
                    user_id.to_string(),
                    entry.session_id.clone(),
                    entry.sub_session_id.clone(),
                    entry.milestone_level.clone(),
                    entry.sub_milestone_level.clone(),
                    format_datetime(entry.created_at),
                    user_id.to_string()
                ],
            )
            .await?;

        if inserted == 0 {
            return Err(Error::LearnerNotFound(user_id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_learner(&self, user_id: &str) -> Result<Option<LearnerRecord>> {
        let mut records = self
            .load_matching("SELECT user_id FROM learners WHERE user_id = ?", [user_id])
            .await?;
        Ok(records.pop())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_learners(&self) -> Result<Vec<LearnerRecord>> {
        self.load_matching("SELECT user_id FROM learners ORDER BY seq ASC", ())
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_by_session(&self, session_id: &str) -> Result<Vec<LearnerRecord>> {
        self.load_matching(
            "SELECT user_id FROM learners WHERE user_id IN (SELECT user_id FROM sessions WHERE session_id = ?) ORDER BY seq ASC",
            [session_id],
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_by_sub_session(&self, sub_session_id: &str) -> Result<Vec<LearnerRecord>> {
        self.load_matching(
            "SELECT user_id FROM learners WHERE user_id IN (SELECT user_id FROM sessions WHERE sub_session_id = ?) ORDER BY seq ASC",
            [sub_session_id],
        )
        .await
    }
}

#[async_trait]
impl FeedbackStore for TursoStore {
    #[instrument(skip(self), level = "debug")]
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO feedback (user_id, session_id, token, feedback) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, session_id, token) DO UPDATE SET feedback = excluded.feedback",
            libsql::params![
                entry.user_id.clone(),
                entry.session_id.clone(),
                entry.token.clone(),
                entry.feedback
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn feedback_for_session(&self, session_id: &str) -> Result<Vec<FeedbackEntry>> {
        self.query_feedback(
            "SELECT user_id, session_id, token, feedback FROM feedback WHERE session_id = ? ORDER BY seq ASC",
            session_id,
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn feedback_for_user(&self, user_id: &str) -> Result<Vec<FeedbackEntry>> {
        self.query_feedback(
            "SELECT user_id, session_id, token, feedback FROM feedback WHERE user_id = ? ORDER BY seq ASC",
            user_id,
        )
        .await
    }
}

#[async_trait]
impl ReferenceStore for TursoStore {
    #[instrument(skip(self), level = "debug")]
    async fn put_token_mapping(&self, mapping: &TokenMapping) -> Result<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO token_mappings (language, token, hexcode) VALUES (?, ?, ?)",
            libsql::params![
                mapping.language.clone(),
                mapping.token.clone(),
                mapping.hexcode.clone()
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn token_mappings(&self, language: &str) -> Result<Vec<TokenMapping>> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT language, token, hexcode FROM token_mappings WHERE language = ? ORDER BY seq ASC",
                [language],
            )
            .await?;

        let mut mappings = Vec::new();
        while let Some(row) = rows.next().await? {
            mappings.push(TokenMapping {
                language: row.get(0)?,
                token: row.get(1)?,
                hexcode: row.get(2)?,
            });
        }
        Ok(mappings)
    }
}

/// Format a datetime for storage.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a datetime from storage.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidData(format!("invalid datetime: {}", s)))
}
