//! Token aggregation
//!
//! Flattens the slice of learner history selected by a [`Scope`] into token
//! observations, and groups observations by key. Grouping works on indices
//! into the observation list so every reduction downstream stays a pure
//! function of the borrowed records.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::model::{LearnerRecord, Session, TokenScore};

/// The slice of history a query operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Every session entry with this id, optionally in one language.
    Session {
        session_id: &'a str,
        language: Option<&'a str>,
    },
    /// Every session entry of any learner with this sub-session id and language.
    SubSession {
        sub_session_id: &'a str,
        language: &'a str,
    },
    /// Every session of one learner, optionally in one language.
    User {
        user_id: &'a str,
        language: Option<&'a str>,
    },
}

impl Scope<'_> {
    /// Whether a session entry owned by `user_id` falls inside this scope.
    pub fn includes(&self, user_id: &str, session: &Session) -> bool {
        match *self {
            Scope::Session {
                session_id,
                language,
            } => session.session_id == session_id && language_matches(language, session),
            Scope::SubSession {
                sub_session_id,
                language,
            } => {
                session.sub_session_id.as_deref() == Some(sub_session_id)
                    && session.language == language
            }
            Scope::User {
                user_id: scope_user,
                language,
            } => user_id == scope_user && language_matches(language, session),
        }
    }
}

fn language_matches(language: Option<&str>, session: &Session) -> bool {
    language.is_none_or(|lang| session.language == lang)
}

/// Which observation lists feed an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// `confidence_scores` only.
    Recognized,
    /// `missing_token_scores` only.
    Missing,
    /// `confidence_scores` followed by `missing_token_scores`.
    RecognizedAndMissing,
}

/// Which list an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Recognized,
    Missing,
}

/// One token score tagged with where and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub language: &'a str,
    pub created_at: DateTime<Utc>,
    pub token: &'a str,
    pub score: f64,
    pub kind: ObservationKind,
}

/// Collect the observations of every in-scope session, in record order, then
/// session order, then list order. For [`ScoreSource::RecognizedAndMissing`]
/// all recognized observations precede all missing ones.
pub fn collect<'a>(
    records: &'a [LearnerRecord],
    scope: &Scope<'_>,
    source: ScoreSource,
) -> Vec<Observation<'a>> {
    let mut observations = Vec::new();
    if matches!(
        source,
        ScoreSource::Recognized | ScoreSource::RecognizedAndMissing
    ) {
        push_from(records, scope, ObservationKind::Recognized, &mut observations);
    }
    if matches!(
        source,
        ScoreSource::Missing | ScoreSource::RecognizedAndMissing
    ) {
        push_from(records, scope, ObservationKind::Missing, &mut observations);
    }
    observations
}

fn push_from<'a>(
    records: &'a [LearnerRecord],
    scope: &Scope<'_>,
    kind: ObservationKind,
    out: &mut Vec<Observation<'a>>,
) {
    for record in records {
        for session in &record.sessions {
            if !scope.includes(&record.user_id, session) {
                continue;
            }
            let scores: &[TokenScore] = match kind {
                ObservationKind::Recognized => &session.confidence_scores,
                ObservationKind::Missing => &session.missing_token_scores,
            };
            out.extend(scores.iter().map(|score| Observation {
                user_id: &record.user_id,
                session_id: &session.session_id,
                language: &session.language,
                created_at: session.created_at,
                token: &score.token,
                score: score.confidence_score,
                kind,
            }));
        }
    }
}

/// Order observations newest session first. The sort is stable, so
/// observations from the same instant keep their collected order.
pub fn most_recent_first(observations: &mut [Observation<'_>]) {
    observations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Group item indices by key, keeping keys in order of first appearance.
pub fn group_indices<'a, T, K, F>(items: &'a [T], key: F) -> Vec<(K, Vec<usize>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let k = key(item);
        match positions.get(&k) {
            Some(&pos) => groups[pos].1.push(index),
            None => {
                positions.insert(k.clone(), groups.len());
                groups.push((k, vec![index]));
            }
        }
    }

    groups
}

/// Token to observed scores, tokens in order of first appearance and scores in
/// observation order.
pub fn token_values<'a>(observations: &[Observation<'a>]) -> Vec<(&'a str, Vec<f64>)> {
    group_indices(observations, |o| o.token)
        .into_iter()
        .map(|(token, indices)| {
            let values = indices.iter().map(|&i| observations[i].score).collect();
            (token, values)
        })
        .collect()
}
