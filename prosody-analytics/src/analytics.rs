//! Query facade over the learner, feedback, and reference stores.
//!
//! Every query reads a snapshot of the records in scope and reduces it in
//! memory. Nothing here caches, so repeated queries over unchanged data return
//! identical results.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::aggregate::Scope;
use crate::classify::{self, Classification, RankedToken, Rule};
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::feedback::{self, FeedbackScope, RejectedToken};
use crate::milestone::{self, CurrentMilestone};
use crate::model::{FeedbackEntry, LearnerRecord, MilestoneEntry, Session, TokenMapping};
use crate::rollup;
use crate::storage::{FeedbackStore, LearnerStore, ReferenceStore};
use crate::vectors::{self, TokenMean, TokenMedian};

/// Analytics over stored learner history.
#[derive(Clone)]
pub struct LearnerAnalytics {
    learners: Arc<dyn LearnerStore>,
    feedback: Arc<dyn FeedbackStore>,
    reference: Arc<dyn ReferenceStore>,
    config: AnalyticsConfig,
}

impl LearnerAnalytics {
    /// Build the facade over one store implementing every storage trait.
    pub fn new<S>(store: Arc<S>, config: AnalyticsConfig) -> Self
    where
        S: LearnerStore + FeedbackStore + ReferenceStore + 'static,
    {
        Self {
            learners: store.clone(),
            feedback: store.clone(),
            reference: store,
            config,
        }
    }

    /// Build the facade from separately provided stores.
    pub fn from_parts(
        learners: Arc<dyn LearnerStore>,
        feedback: Arc<dyn FeedbackStore>,
        reference: Arc<dyn ReferenceStore>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            learners,
            feedback,
            reference,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    // --- write path ---

    /// Store a practice session, creating the learner record on first use.
    pub async fn record_session(&self, user_id: &str, session: &Session) -> Result<()> {
        self.learners.append_session(user_id, session).await
    }

    pub async fn record_milestone(&self, user_id: &str, entry: &MilestoneEntry) -> Result<()> {
        self.learners.append_milestone(user_id, entry).await
    }

    /// Upsert reviewer feedback for `(user, session, token)`.
    pub async fn record_feedback(&self, entry: &FeedbackEntry) -> Result<()> {
        self.feedback.upsert_feedback(entry).await
    }

    // --- classification ---

    /// Tokens below threshold in one session, by the rolling rule.
    ///
    /// Tokens that were only ever missed are included with their first
    /// missing-token score.
    ///
    /// A `language` filter drops out-of-language entries before scoring, for
    /// recognized and missing tokens alike. Scores therefore come from
    /// in-language observations only. Earlier deployments scored an
    /// in-language token over every observation in the session and reported
    /// missing tokens of any language, so filtered results can differ from
    /// theirs.
    #[instrument(skip(self), level = "debug")]
    pub async fn targets_by_session(
        &self,
        session_id: &str,
        language: Option<&str>,
    ) -> Result<Vec<RankedToken>> {
        let records = self.learners.find_by_session(session_id).await?;
        let scope = Scope::Session {
            session_id,
            language,
        };
        let rule = Rule::rolling(&self.config.thresholds);
        Ok(self.classify(&records, &scope, &rule, Classification::Targets))
    }

    /// Tokens at or above threshold in one session, by the rolling rule.
    #[instrument(skip(self), level = "debug")]
    pub async fn familiarity_by_session(&self, session_id: &str) -> Result<Vec<RankedToken>> {
        let records = self.learners.find_by_session(session_id).await?;
        let scope = Scope::Session {
            session_id,
            language: None,
        };
        let rule = Rule::rolling(&self.config.thresholds);
        Ok(self.classify(&records, &scope, &rule, Classification::Familiarity))
    }

    /// Tokens below threshold in a sub-session, averaged per learner and session.
    #[instrument(skip(self), level = "debug")]
    pub async fn targets_by_sub_session(
        &self,
        sub_session_id: &str,
        content_type: Option<&str>,
        language: &str,
    ) -> Result<Vec<RankedToken>> {
        let records = self.learners.find_by_sub_session(sub_session_id).await?;
        let scope = Scope::SubSession {
            sub_session_id,
            language,
        };
        let rule = Rule::grouped_mean(&self.config.thresholds, content_type);
        Ok(self.classify(&records, &scope, &rule, Classification::Targets))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn familiarity_by_sub_session(
        &self,
        sub_session_id: &str,
        content_type: Option<&str>,
        language: &str,
    ) -> Result<Vec<RankedToken>> {
        let records = self.learners.find_by_sub_session(sub_session_id).await?;
        let scope = Scope::SubSession {
            sub_session_id,
            language,
        };
        let rule = Rule::grouped_mean(&self.config.thresholds, content_type);
        Ok(self.classify(&records, &scope, &rule, Classification::Familiarity))
    }

    /// Tokens below threshold across a learner's whole history.
    #[instrument(skip(self), level = "debug")]
    pub async fn targets_by_user(
        &self,
        user_id: &str,
        language: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Vec<RankedToken>> {
        let records = self.user_records(user_id).await?;
        let scope = Scope::User { user_id, language };
        let rule = Rule::grouped_mean(&self.config.thresholds, content_type);
        Ok(self.classify(&records, &scope, &rule, Classification::Targets))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn familiarity_by_user(
        &self,
        user_id: &str,
        language: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Vec<RankedToken>> {
        let records = self.user_records(user_id).await?;
        let scope = Scope::User { user_id, language };
        let rule = Rule::grouped_mean(&self.config.thresholds, content_type);
        Ok(self.classify(&records, &scope, &rule, Classification::Familiarity))
    }

    fn classify(
        &self,
        records: &[LearnerRecord],
        scope: &Scope<'_>,
        rule: &Rule,
        classification: Classification,
    ) -> Vec<RankedToken> {
        let ranked = classify::classify(records, scope, rule, classification);
        debug!(
            ?classification,
            threshold = rule.threshold(),
            tokens = ranked.len(),
            "classified tokens"
        );
        ranked
    }

    // --- vectors ---

    #[instrument(skip(self), level = "debug")]
    pub async fn mean_by_session(&self, session_id: &str) -> Result<Vec<TokenMean>> {
        let records = self.learners.find_by_session(session_id).await?;
        let scope = Scope::Session {
            session_id,
            language: None,
        };
        Ok(vectors::mean_vector(&records, &scope))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn mean_by_user(&self, user_id: &str) -> Result<Vec<TokenMean>> {
        let records = self.user_records(user_id).await?;
        let scope = Scope::User {
            user_id,
            language: None,
        };
        Ok(vectors::mean_vector(&records, &scope))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn median_by_session(&self, session_id: &str) -> Result<Vec<TokenMedian>> {
        let records = self.learners.find_by_session(session_id).await?;
        let scope = Scope::Session {
            session_id,
            language: None,
        };
        Ok(vectors::median_vector(&records, &scope))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn median_by_user(&self, user_id: &str) -> Result<Vec<TokenMedian>> {
        let records = self.user_records(user_id).await?;
        let scope = Scope::User {
            user_id,
            language: None,
        };
        Ok(vectors::median_vector(&records, &scope))
    }

    // --- milestones and rollup ---

    /// The learner's most recent milestone in `language`, if any resolves.
    #[instrument(skip(self), level = "debug")]
    pub async fn current_milestone(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<CurrentMilestone>> {
        let Some(record) = self.learners.get_learner(user_id).await? else {
            return Ok(None);
        };

        let unresolved = record
            .milestones
            .iter()
            .filter(|entry| milestone::resolve_language(&record, entry).is_none())
            .count();
        if unresolved > 0 {
            warn!(
                user_id,
                unresolved, "skipping milestone entries with no matching sub-session"
            );
        }

        Ok(milestone::current_milestone(&record, language))
    }

    /// Distinct session ids, descending, truncated to `limit`. With
    /// `calculate_milestone`, sessions below the configured minimum record
    /// count are dropped.
    #[instrument(skip(self), level = "debug")]
    pub async fn session_rollup(
        &self,
        user_id: &str,
        limit: usize,
        calculate_milestone: bool,
    ) -> Result<Vec<String>> {
        let Some(record) = self.learners.get_learner(user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(rollup::session_rollup(
            &record,
            limit,
            calculate_milestone,
            self.config.rollup.min_records_for_milestone,
        ))
    }

    // --- feedback ---

    #[instrument(skip(self), level = "debug")]
    pub async fn rejected_tokens_by_session(&self, session_id: &str) -> Result<Vec<RejectedToken>> {
        let entries = self.feedback.feedback_for_session(session_id).await?;
        Ok(feedback::rejected_tokens(
            &entries,
            FeedbackScope::Session(session_id),
        ))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn rejected_tokens_by_user(&self, user_id: &str) -> Result<Vec<RejectedToken>> {
        let entries = self.feedback.feedback_for_user(user_id).await?;
        Ok(feedback::rejected_tokens(&entries, FeedbackScope::User(user_id)))
    }

    // --- supplementary lookups ---

    /// Mean fluency score of the sub-session's sessions that carry one.
    #[instrument(skip(self), level = "debug")]
    pub async fn fluency_by_sub_session(
        &self,
        sub_session_id: &str,
        language: &str,
    ) -> Result<Option<f64>> {
        let records = self.learners.find_by_sub_session(sub_session_id).await?;
        let scope = Scope::SubSession {
            sub_session_id,
            language,
        };
        let scores: Vec<f64> = records
            .iter()
            .flat_map(|record| {
                record
                    .sessions
                    .iter()
                    .filter(|s| scope.includes(&record.user_id, s))
                    .filter_map(|s| s.diagnostics.fluency_score)
            })
            .collect();
        Ok(vectors::mean(&scores))
    }

    pub async fn learner(&self, user_id: &str) -> Result<Option<LearnerRecord>> {
        self.learners.get_learner(user_id).await
    }

    pub async fn learners_by_session(&self, session_id: &str) -> Result<Vec<LearnerRecord>> {
        self.learners.find_by_session(session_id).await
    }

    pub async fn learners(&self) -> Result<Vec<LearnerRecord>> {
        self.learners.list_learners().await
    }

    pub async fn record_token_mapping(&self, mapping: &TokenMapping) -> Result<()> {
        self.reference.put_token_mapping(mapping).await
    }

    pub async fn token_mappings(&self, language: &str) -> Result<Vec<TokenMapping>> {
        self.reference.token_mappings(language).await
    }

    /// Reference tokens for a language in stored order.
    #[instrument(skip(self), level = "debug")]
    pub async fn expected_tokens(&self, language: &str) -> Result<Vec<String>> {
        let mappings = self.reference.token_mappings(language).await?;
        Ok(mappings.into_iter().map(|m| m.token).collect())
    }

    async fn user_records(&self, user_id: &str) -> Result<Vec<LearnerRecord>> {
        Ok(self
            .learners
            .get_learner(user_id)
            .await?
            .into_iter()
            .collect())
    }
}
