//! Stored data shapes: learner records, practice sessions and their token
//! observations, milestone entries, feedback and reference tokens.
//!
//! Field names follow the stored learner documents; the `alias` attributes
//! accept the legacy spellings found in older records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One learner and the append-only history of their practice.
///
/// `sessions` and `milestones` are arenas indexed by insertion order. Entries
/// are only ever pushed, never mutated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerRecord {
    pub user_id: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default, rename = "milestone_progress")]
    pub milestones: Vec<MilestoneEntry>,
}

impl LearnerRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            sessions: Vec::new(),
            milestones: Vec::new(),
        }
    }

    /// Whether any session entry carries this session id.
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.iter().any(|s| s.session_id == session_id)
    }

    /// Whether any session entry carries this sub-session id.
    pub fn has_sub_session(&self, sub_session_id: &str) -> bool {
        self.sessions
            .iter()
            .any(|s| s.sub_session_id.as_deref() == Some(sub_session_id))
    }
}

/// One practice attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_session_id: Option<String>,
    /// char, word, sentence or paragraph
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(default, rename = "contentId", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub language: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Prompt shown to the learner.
    #[serde(default)]
    pub original_text: String,
    /// Text recognized from the learner's audio.
    #[serde(default)]
    pub response_text: String,
    /// Response reconciled against the prompt.
    #[serde(default)]
    pub construct_text: String,
    #[serde(default, rename = "asrOutput")]
    pub recognized_text: String,
    /// Tokens the recognizer matched.
    #[serde(default)]
    pub confidence_scores: Vec<TokenScore>,
    /// Tokens expected but not recognized.
    #[serde(default)]
    pub missing_token_scores: Vec<TokenScore>,
    /// Tokens recognized as noise.
    #[serde(default, alias = "anamolydata_scores")]
    pub anomaly_scores: Vec<TokenScore>,
    #[serde(flatten)]
    pub diagnostics: SessionDiagnostics,
}

impl Session {
    /// A session with no texts, observations or diagnostics.
    pub fn new(
        session_id: impl Into<String>,
        content_type: impl Into<String>,
        language: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sub_session_id: None,
            content_type: content_type.into(),
            content_id: None,
            language: language.into(),
            created_at,
            original_text: String::new(),
            response_text: String::new(),
            construct_text: String::new(),
            recognized_text: String::new(),
            confidence_scores: Vec::new(),
            missing_token_scores: Vec::new(),
            anomaly_scores: Vec::new(),
            diagnostics: SessionDiagnostics::default(),
        }
    }

    #[must_use]
    pub fn with_sub_session(mut self, sub_session_id: impl Into<String>) -> Self {
        self.sub_session_id = Some(sub_session_id.into());
        self
    }

    /// Append recognized-token observations.
    #[must_use]
    pub fn with_confidence(mut self, scores: &[(&str, f64)]) -> Self {
        self.confidence_scores
            .extend(scores.iter().map(|(t, s)| TokenScore::new(*t, *s)));
        self
    }

    /// Append missing-token observations.
    #[must_use]
    pub fn with_missing(mut self, scores: &[(&str, f64)]) -> Self {
        self.missing_token_scores
            .extend(scores.iter().map(|(t, s)| TokenScore::new(*t, *s)));
        self
    }

    #[must_use]
    pub fn with_fluency(mut self, fluency_score: f64) -> Self {
        self.diagnostics.fluency_score = Some(fluency_score);
        self
    }
}

/// A single confidence observation for one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenScore {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hexcode: Option<String>,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_status: Option<i32>,
}

impl TokenScore {
    pub fn new(token: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            token: token.into(),
            hexcode: None,
            confidence_score,
            identification_status: None,
        }
    }
}

/// Diagnostic scalars stored with a session and returned verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<ErrorRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_diff: Option<CountDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_repetitions: Option<u32>,
    #[serde(
        default,
        alias = "eucledian_distance",
        skip_serializing_if = "Option::is_none"
    )]
    pub edit_distance: Option<EditOperations>,
    #[serde(
        default,
        rename = "fluencyScore",
        skip_serializing_if = "Option::is_none"
    )]
    pub fluency_score: Option<f64>,
    #[serde(
        default,
        alias = "silence_Pause",
        skip_serializing_if = "Option::is_none"
    )]
    pub silence_pause: Option<SilencePause>,
    #[serde(
        default,
        alias = "reptitionsCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub repetitions_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRate {
    #[serde(default)]
    pub word: f64,
    #[serde(default)]
    pub character: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountDiff {
    #[serde(default)]
    pub character: i64,
    #[serde(default)]
    pub word: i64,
}

/// Edit operations needed to turn the response into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditOperations {
    #[serde(default)]
    pub insertions: CharEdits,
    #[serde(default)]
    pub deletions: CharEdits,
    #[serde(default)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharEdits {
    #[serde(default)]
    pub chars: Vec<String>,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Substitutions {
    #[serde(default)]
    pub chars: Vec<Substitution>,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    #[serde(default)]
    pub removed: String,
    #[serde(default)]
    pub replaced: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SilencePause {
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub count: u32,
}

/// A milestone level reached by the learner.
///
/// Carries no language: it is resolved through the session sharing its
/// `sub_session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEntry {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_session_id: Option<String>,
    pub milestone_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_milestone_level: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Human feedback on one token of one session.
///
/// `feedback == 0` marks the token as rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub user_id: String,
    pub session_id: String,
    pub token: String,
    pub feedback: i64,
}

impl FeedbackEntry {
    /// Upsert key.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.user_id, &self.session_id, &self.token)
    }
}

/// Reference row mapping a language to one of its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMapping {
    pub language: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hexcode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_reads_legacy_document_fields() {
        let json = r#"{
            "session_id": "s1",
            "sub_session_id": "sub1",
            "contentType": "Word",
            "language": "ta",
            "createdAt": "2024-03-01T10:00:00Z",
            "original_text": "amma",
            "response_text": "ama",
            "construct_text": "ama",
            "asrOutput": "ama",
            "confidence_scores": [{"token": "a", "confidence_score": 0.93}],
            "missing_token_scores": [{"token": "m", "hexcode": "0bae", "confidence_score": 0.1}],
            "anamolydata_scores": [{"token": "x", "confidence_score": 0.4, "identification_status": 2}],
            "fluencyScore": 1.5,
            "eucledian_distance": {
                "insertions": {"chars": [], "count": 0},
                "deletions": {"chars": ["m"], "count": 1},
                "substitutions": {"chars": [{"removed": "a", "replaced": "e"}], "count": 1}
            },
            "silence_Pause": {"total_duration": 0.8, "count": 2},
            "reptitionsCount": 1
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.content_type, "Word");
        assert_eq!(session.recognized_text, "ama");
        assert_eq!(session.anomaly_scores[0].identification_status, Some(2));
        assert_eq!(session.missing_token_scores[0].hexcode.as_deref(), Some("0bae"));
        assert_eq!(session.diagnostics.fluency_score, Some(1.5));
        let edits = session.diagnostics.edit_distance.as_ref().unwrap();
        assert_eq!(edits.deletions.count, 1);
        assert_eq!(edits.substitutions.chars[0].replaced, "e");
        assert_eq!(session.diagnostics.silence_pause.as_ref().unwrap().count, 2);
        assert_eq!(session.diagnostics.repetitions_count, Some(1));
    }

    #[test]
    fn learner_record_reads_milestone_progress() {
        let json = r#"{
            "user_id": "u1",
            "milestone_progress": [{
                "session_id": "s1",
                "milestone_level": "m2",
                "createdAt": "2024-03-01T10:00:00Z"
            }]
        }"#;

        let record: LearnerRecord = serde_json::from_str(json).unwrap();

        assert!(record.sessions.is_empty());
        assert_eq!(record.milestones.len(), 1);
        assert_eq!(record.milestones[0].milestone_level, "m2");
        assert!(record.milestones[0].sub_session_id.is_none());
    }

    #[test]
    fn session_lookups() {
        let mut record = LearnerRecord::new("u1");
        record.sessions.push(
            Session::new("s1", "char", "hi", Utc::now())
                .with_sub_session("sub1")
                .with_confidence(&[("क", 0.9)]),
        );

        assert!(record.has_session("s1"));
        assert!(!record.has_session("s2"));
        assert!(record.has_sub_session("sub1"));
        assert!(!record.has_sub_session("sub2"));
    }
}
