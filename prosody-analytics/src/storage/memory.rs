//! In-memory store.
//!
//! Records live in insertion-ordered vectors with index maps for lookup.
//! Every mutation takes the write lock, so concurrent appends for the same
//! learner are applied one after another and none is lost.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{FeedbackStore, LearnerStore, ReferenceStore};
use crate::error::{Error, Result};
use crate::model::{FeedbackEntry, LearnerRecord, MilestoneEntry, Session, TokenMapping};

type FeedbackKey = (String, String, String);

#[derive(Default)]
struct State {
    learners: Vec<LearnerRecord>,
    learner_index: HashMap<String, usize>,
    feedback: Vec<FeedbackEntry>,
    feedback_index: HashMap<FeedbackKey, usize>,
    mappings: Vec<TokenMapping>,
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records, e.g. an exported collection.
    pub fn with_learners(learners: Vec<LearnerRecord>) -> Self {
        let learner_index = learners
            .iter()
            .enumerate()
            .map(|(i, r)| (r.user_id.clone(), i))
            .collect();
        Self {
            state: RwLock::new(State {
                learners,
                learner_index,
                ..State::default()
            }),
        }
    }

    async fn find_where<F>(&self, predicate: F) -> Vec<LearnerRecord>
    where
        F: Fn(&LearnerRecord) -> bool,
    {
        let state = self.state.read().await;
        state
            .learners
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LearnerStore for MemoryStore {
    #[instrument(skip(self, session), fields(session_id = %session.session_id), level = "debug")]
    async fn append_session(&self, user_id: &str, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state.learner_index.get(user_id).copied();
        let index = match existing {
            Some(index) => index,
            None => {
                debug!(user_id, "creating learner record");
                let index = state.learners.len();
                state.learners.push(LearnerRecord::new(user_id));
                state.learner_index.insert(user_id.to_string(), index);
                index
            }
        };
        state.learners[index].sessions.push(session.clone());
        Ok(())
    }

    #[instrument(skip(self, entry), level = "debug")]
    async fn append_milestone(&self, user_id: &str, entry: &MilestoneEntry) -> Result<()> {
        let mut state = self.state.write().await;
        let index = *state
            .learner_index
            .get(user_id)
            .ok_or_else(|| Error::LearnerNotFound(user_id.to_string()))?;
        state.learners[index].milestones.push(entry.clone());
        Ok(())
    }

    async fn get_learner(&self, user_id: &str) -> Result<Option<LearnerRecord>> {
        let state = self.state.read().await;
        Ok(state
            .learner_index
            .get(user_id)
            .map(|&i| state.learners[i].clone()))
    }

    async fn list_learners(&self) -> Result<Vec<LearnerRecord>> {
        Ok(self.state.read().await.learners.clone())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Vec<LearnerRecord>> {
        Ok(self.find_where(|r| r.has_session(session_id)).await)
    }

    async fn find_by_sub_session(&self, sub_session_id: &str) -> Result<Vec<LearnerRecord>> {
        Ok(self.find_where(|r| r.has_sub_session(sub_session_id)).await)
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    #[instrument(skip(self), level = "debug")]
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (
            entry.user_id.clone(),
            entry.session_id.clone(),
            entry.token.clone(),
        );
        let existing = state.feedback_index.get(&key).copied();
        match existing {
            Some(index) => state.feedback[index].feedback = entry.feedback,
            None => {
                let index = state.feedback.len();
                state.feedback.push(entry.clone());
                state.feedback_index.insert(key, index);
            }
        }
        Ok(())
    }

    async fn feedback_for_session(&self, session_id: &str) -> Result<Vec<FeedbackEntry>> {
        let state = self.state.read().await;
        Ok(state
            .feedback
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn feedback_for_user(&self, user_id: &str) -> Result<Vec<FeedbackEntry>> {
        let state = self.state.read().await;
        Ok(state
            .feedback
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn put_token_mapping(&self, mapping: &TokenMapping) -> Result<()> {
        self.state.write().await.mappings.push(mapping.clone());
        Ok(())
    }

    async fn token_mappings(&self, language: &str) -> Result<Vec<TokenMapping>> {
        let state = self.state.read().await;
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.language == language)
            .cloned()
            .collect())
    }
}
