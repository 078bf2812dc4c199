//! Feedback aggregation: tokens a reviewer rejected.
//!
//! Feedback is upserted per (user, session, token), so within one key the
//! last write wins. Across keys, a token is rejected for a scope only when
//! the highest feedback value recorded for it is [`REJECTED`].

use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::model::FeedbackEntry;

/// Feedback value marking a token as rejected.
pub const REJECTED: i64 = 0;

/// Grouping scope for rejected tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackScope<'a> {
    Session(&'a str),
    User(&'a str),
}

impl FeedbackScope<'_> {
    fn includes(&self, entry: &FeedbackEntry) -> bool {
        match *self {
            FeedbackScope::Session(session_id) => entry.session_id == session_id,
            FeedbackScope::User(user_id) => entry.user_id == user_id,
        }
    }
}

/// A token whose every feedback entry in scope was a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub token: String,
    pub feedback: i64,
}

/// Rejected tokens in scope, in order of first feedback.
pub fn rejected_tokens(entries: &[FeedbackEntry], scope: FeedbackScope<'_>) -> Vec<RejectedToken> {
    let in_scope: Vec<&FeedbackEntry> = entries.iter().filter(|e| scope.includes(e)).collect();

    aggregate::group_indices(&in_scope, |e| e.token.as_str())
        .into_iter()
        .filter_map(|(token, indices)| {
            let max = indices.iter().map(|&i| in_scope[i].feedback).max()?;
            (max == REJECTED).then(|| {
                let (session_id, user_id) = match scope {
                    FeedbackScope::Session(id) => (Some(id.to_string()), None),
                    FeedbackScope::User(id) => (None, Some(id.to_string())),
                };
                RejectedToken {
                    session_id,
                    user_id,
                    token: token.to_string(),
                    feedback: REJECTED,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(user_id: &str, session_id: &str, token: &str, feedback: i64) -> FeedbackEntry {
        FeedbackEntry {
            user_id: user_id.into(),
            session_id: session_id.into(),
            token: token.into(),
            feedback,
        }
    }

    #[test]
    fn session_scope_reports_tokens_rejected_everywhere() {
        let entries = vec![
            fb("u1", "s1", "a", 0),
            fb("u2", "s1", "a", 0),
            fb("u1", "s1", "b", 0),
            fb("u2", "s1", "b", 1),
            fb("u1", "s2", "c", 0),
        ];

        let rejected = rejected_tokens(&entries, FeedbackScope::Session("s1"));

        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].token, "a");
        assert_eq!(rejected[0].session_id.as_deref(), Some("s1"));
        assert!(rejected[0].user_id.is_none());
        assert_eq!(rejected[0].feedback, 0);
    }

    #[test]
    fn user_scope_groups_across_sessions() {
        let entries = vec![
            fb("u1", "s1", "a", 0),
            fb("u1", "s2", "a", 2),
            fb("u1", "s2", "b", 0),
            fb("u2", "s3", "a", 0),
        ];

        let rejected = rejected_tokens(&entries, FeedbackScope::User("u1"));

        let tokens: Vec<_> = rejected.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["b"]);
        assert_eq!(rejected[0].user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn empty_scope_rejects_nothing() {
        assert!(rejected_tokens(&[], FeedbackScope::User("u1")).is_empty());
    }

    #[test]
    fn serializes_only_the_scope_field() {
        let row = RejectedToken {
            session_id: Some("s1".into()),
            user_id: None,
            token: "a".into(),
            feedback: 0,
        };

        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"session_id": "s1", "token": "a", "feedback": 0})
        );
    }
}
