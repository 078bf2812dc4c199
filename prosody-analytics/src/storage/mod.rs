//! Storage traits and implementations for learner history.
//!
//! - [`LearnerStore`] - append-only learner records (sessions, milestones)
//! - [`FeedbackStore`] - keyed feedback upserts
//! - [`ReferenceStore`] - per-language reference tokens
//!
//! Appends never read-modify-write a record: [`MemoryStore`] serializes them
//! behind a write lock and [`TursoStore`] issues one `INSERT` per append.

mod memory;
mod turso;

pub use memory::MemoryStore;
pub use turso::TursoStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{FeedbackEntry, LearnerRecord, MilestoneEntry, Session, TokenMapping};

/// Learner records and their append-only history.
#[async_trait]
pub trait LearnerStore: Send + Sync {
    /// Append a session, creating the learner record on first submission.
    async fn append_session(&self, user_id: &str, session: &Session) -> Result<()>;

    /// Append a milestone entry to an existing learner record.
    ///
    /// Fails with [`Error::LearnerNotFound`](crate::Error::LearnerNotFound)
    /// when the learner has never submitted a session.
    async fn append_milestone(&self, user_id: &str, entry: &MilestoneEntry) -> Result<()>;

    /// Get one learner's record.
    async fn get_learner(&self, user_id: &str) -> Result<Option<LearnerRecord>>;

    /// All learner records in creation order.
    async fn list_learners(&self) -> Result<Vec<LearnerRecord>>;

    /// Records holding at least one session entry with this session id.
    async fn find_by_session(&self, session_id: &str) -> Result<Vec<LearnerRecord>>;

    /// Records holding at least one session entry with this sub-session id.
    async fn find_by_sub_session(&self, sub_session_id: &str) -> Result<Vec<LearnerRecord>>;
}

/// Reviewer feedback keyed by (user, session, token).
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert feedback, or overwrite the value already stored for its key.
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<()>;

    /// Feedback recorded for a session, in first-insertion order.
    async fn feedback_for_session(&self, session_id: &str) -> Result<Vec<FeedbackEntry>>;

    /// Feedback recorded by a user, in first-insertion order.
    async fn feedback_for_user(&self, user_id: &str) -> Result<Vec<FeedbackEntry>>;
}

/// Reference token lists per language.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn put_token_mapping(&self, mapping: &TokenMapping) -> Result<()>;

    /// Mappings for a language in insertion order.
    async fn token_mappings(&self, language: &str) -> Result<Vec<TokenMapping>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn LearnerStore>) {}
    }

    #[test]
    fn feedback_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn FeedbackStore>) {}
    }

    #[test]
    fn reference_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn ReferenceStore>) {}
    }
}
