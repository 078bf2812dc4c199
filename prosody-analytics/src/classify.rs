//! Target and familiarity classification.
//!
//! Two reductions decide whether a token is weak or mastered, and they are
//! kept as separate strategies:
//!
//! - [`RollingRule`] walks a token's observations in order and admits a value
//!   only when it is at least the running sum so far, then divides the sum by
//!   the admitted count. Dropping or reordering observations changes the
//!   result. Used for single-session queries.
//! - [`GroupedMeanRule`] takes the arithmetic mean of recognized and missing
//!   observations grouped by token and learner (and session for sub-session
//!   scope). Used for sub-session and whole-history queries.
//!
//! Both finish by ranking tokens ascending by score.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Scope, ScoreSource};
use crate::config::Thresholds;
use crate::model::LearnerRecord;

/// Which side of the threshold a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Tokens scoring below the threshold.
    Targets,
    /// Tokens scoring at or above the threshold.
    Familiarity,
}

impl Classification {
    fn admits(self, score: f64, threshold: f64) -> bool {
        match self {
            Classification::Targets => score < threshold,
            Classification::Familiarity => score >= threshold,
        }
    }
}

/// A classified token and its reduced score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedToken {
    pub token: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl RankedToken {
    fn bare(token: &str, score: f64) -> Self {
        Self {
            token: token.to_string(),
            score,
            user_id: None,
            session_id: None,
        }
    }
}

/// Monotone-filtered running score over observations in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingRule {
    pub threshold: f64,
}

/// Arithmetic mean per (token, learner[, session]) group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupedMeanRule {
    pub threshold: f64,
}

/// Classification strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Rolling(RollingRule),
    GroupedMean(GroupedMeanRule),
}

impl Rule {
    /// Session rule; always uses the default threshold.
    pub fn rolling(thresholds: &Thresholds) -> Self {
        Rule::Rolling(RollingRule {
            threshold: thresholds.default_threshold,
        })
    }

    /// Sub-session/user rule; threshold depends on the content type.
    pub fn grouped_mean(thresholds: &Thresholds, content_type: Option<&str>) -> Self {
        Rule::GroupedMean(GroupedMeanRule {
            threshold: thresholds.for_content_type(content_type),
        })
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Rule::Rolling(rule) => rule.threshold,
            Rule::GroupedMean(rule) => rule.threshold,
        }
    }
}

/// Classify the tokens of a scope with the given rule, ranked ascending by score.
pub fn classify(
    records: &[LearnerRecord],
    scope: &Scope<'_>,
    rule: &Rule,
    classification: Classification,
) -> Vec<RankedToken> {
    let mut ranked = match rule {
        Rule::Rolling(rule) => rule.apply(records, scope, classification),
        Rule::GroupedMean(rule) => rule.apply(records, scope, classification),
    };
    rank(&mut ranked);
    ranked
}

fn rank(tokens: &mut [RankedToken]) {
    tokens.sort_by(|a, b| a.score.total_cmp(&b.score));
}

/// Running score of a token's observations, or `None` when no observation
/// was admitted.
///
/// A value is admitted when it is at least the running sum; admitted values
/// are added to the sum. The result is the sum divided by the admitted count.
pub fn rolling_score(values: &[f64]) -> Option<f64> {
    let mut accumulator = 0.0;
    let mut count = 0usize;
    for &value in values {
        if value >= accumulator {
            accumulator += value;
            count += 1;
        }
    }
    (count > 0).then(|| accumulator / count as f64)
}

impl RollingRule {
    fn apply(
        &self,
        records: &[LearnerRecord],
        scope: &Scope<'_>,
        classification: Classification,
    ) -> Vec<RankedToken> {
        let recognized = aggregate::collect(records, scope, ScoreSource::Recognized);
        let grouped = aggregate::token_values(&recognized);

        let mut ranked: Vec<RankedToken> = grouped
            .iter()
            .filter_map(|(token, values)| {
                let score = rolling_score(values)?;
                classification
                    .admits(score, self.threshold)
                    .then(|| RankedToken::bare(token, score))
            })
            .collect();

        // Never-recognized tokens are always targets, scored by their raw
        // missing-token confidence.
        if classification == Classification::Targets {
            let recognized_tokens: HashSet<&str> = grouped.iter().map(|(t, _)| *t).collect();
            let mut added: HashSet<&str> = HashSet::new();
            for observation in aggregate::collect(records, scope, ScoreSource::Missing) {
                if !recognized_tokens.contains(observation.token) && added.insert(observation.token)
                {
                    ranked.push(RankedToken::bare(observation.token, observation.score));
                }
            }
        }

        ranked
    }
}

impl GroupedMeanRule {
    fn apply(
        &self,
        records: &[LearnerRecord],
        scope: &Scope<'_>,
        classification: Classification,
    ) -> Vec<RankedToken> {
        let mut observations =
            aggregate::collect(records, scope, ScoreSource::RecognizedAndMissing);
        aggregate::most_recent_first(&mut observations);

        let per_session = !matches!(scope, Scope::User { .. });
        let groups = aggregate::group_indices(&observations, |o| {
            (o.token, o.user_id, per_session.then_some(o.session_id))
        });

        groups
            .into_iter()
            .filter_map(|((token, user_id, session_id), indices)| {
                let sum: f64 = indices.iter().map(|&i| observations[i].score).sum();
                let mean = sum / indices.len() as f64;
                classification
                    .admits(mean, self.threshold)
                    .then(|| RankedToken {
                        token: token.to_string(),
                        score: mean,
                        user_id: Some(user_id.to_string()),
                        session_id: session_id.map(str::to_string),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).unwrap()
    }

    fn learner(user_id: &str, sessions: Vec<Session>) -> LearnerRecord {
        let mut record = LearnerRecord::new(user_id);
        record.sessions = sessions;
        record
    }

    fn session_scope(session_id: &str) -> Scope<'_> {
        Scope::Session {
            session_id,
            language: None,
        }
    }

    fn tokens(ranked: &[RankedToken]) -> Vec<&str> {
        ranked.iter().map(|r| r.token.as_str()).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rolling_score_skips_values_below_running_sum() {
        // 0.5 admitted, 0.3 < 0.5 skipped, 0.9 >= 0.5 admitted: (0.5 + 0.9) / 2
        assert!(approx(rolling_score(&[0.5, 0.3, 0.9]).unwrap(), 0.7));
    }

    #[test]
    fn rolling_score_is_order_sensitive() {
        let with_first = rolling_score(&[0.5, 0.3, 0.9]).unwrap();
        let without_first = rolling_score(&[0.3, 0.9]).unwrap();

        assert!(approx(without_first, 0.6));
        assert!(!approx(with_first, without_first));
    }

    #[test]
    fn rolling_score_never_uses_a_value_below_the_accumulator() {
        // After 0.9 the sum is 0.9, so 0.8 is never admitted.
        assert!(approx(rolling_score(&[0.9, 0.8]).unwrap(), 0.9));
        assert!(approx(rolling_score(&[0.2, 0.1, 0.15, 0.3]).unwrap(), 0.25));
    }

    #[test]
    fn rolling_score_without_admitted_values_is_none() {
        assert_eq!(rolling_score(&[]), None);
        assert_eq!(rolling_score(&[-0.2, -0.5]), None);
    }

    #[test]
    fn session_targets_include_below_threshold_and_missing_tokens() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0))
                    .with_confidence(&[("a", 0.4), ("b", 0.95), ("c", 0.6)])
                    .with_missing(&[("d", 0.2), ("a", 0.05), ("e", 0.97), ("d", 0.1)]),
            ],
        )];
        let rule = Rule::rolling(&Thresholds::default());

        let ranked = classify(
            &records,
            &session_scope("s1"),
            &rule,
            Classification::Targets,
        );

        // "a" comes from recognized scores only, "d" once with its first raw
        // score, "e" despite scoring above the threshold.
        assert_eq!(tokens(&ranked), vec!["d", "a", "c", "e"]);
        assert!(approx(ranked[0].score, 0.2));
        assert!(approx(ranked[1].score, 0.4));
        assert!(ranked.iter().all(|r| r.user_id.is_none()));
    }

    #[test]
    fn session_targets_respect_language_filter() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0)).with_confidence(&[("a", 0.4)]),
                Session::new("s1", "char", "ta", at(1))
                    .with_confidence(&[("b", 0.3)])
                    .with_missing(&[("c", 0.1)]),
            ],
        )];
        let rule = Rule::rolling(&Thresholds::default());
        let scope = Scope::Session {
            session_id: "s1",
            language: Some("hi"),
        };

        let ranked = classify(&records, &scope, &rule, Classification::Targets);

        assert_eq!(tokens(&ranked), vec!["a"]);
    }

    #[test]
    fn session_familiarity_uses_recognized_scores_only() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0))
                    .with_confidence(&[("a", 0.95), ("b", 0.9), ("b", 0.85), ("c", 0.5)])
                    .with_missing(&[("d", 0.99)]),
            ],
        )];
        let rule = Rule::rolling(&Thresholds::default());

        let ranked = classify(
            &records,
            &session_scope("s1"),
            &rule,
            Classification::Familiarity,
        );

        // "b": 0.85 < 0.9 is skipped, so its score stays 0.9 (familiar).
        assert_eq!(tokens(&ranked), vec!["b", "a"]);
        assert!(approx(ranked[0].score, 0.9));
    }

    #[test]
    fn exact_default_threshold_is_familiar_not_target() {
        let records = vec![learner(
            "u1",
            vec![Session::new("s1", "char", "hi", at(0)).with_confidence(&[("a", 0.9)])],
        )];
        let thresholds = Thresholds::default();
        let scope = session_scope("s1");

        for rule in [
            Rule::rolling(&thresholds),
            Rule::grouped_mean(&thresholds, Some("char")),
        ] {
            assert!(classify(&records, &scope, &rule, Classification::Targets).is_empty());
            assert_eq!(
                tokens(&classify(&records, &scope, &rule, Classification::Familiarity)),
                vec!["a"]
            );
        }
    }

    #[test]
    fn exact_word_threshold_is_familiar_not_target() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "word", "en", at(0))
                    .with_sub_session("sub")
                    .with_confidence(&[("cat", 0.5), ("cat", 1.0)]),
            ],
        )];
        let rule = Rule::grouped_mean(&Thresholds::default(), Some("WORD"));
        let scope = Scope::SubSession {
            sub_session_id: "sub",
            language: "en",
        };

        assert!(approx(rule.threshold(), 0.75));
        assert!(classify(&records, &scope, &rule, Classification::Targets).is_empty());
        let familiar = classify(&records, &scope, &rule, Classification::Familiarity);
        assert_eq!(tokens(&familiar), vec!["cat"]);
        assert!(approx(familiar[0].score, 0.75));
    }

    #[test]
    fn grouped_mean_is_the_arithmetic_mean_of_recognized_and_missing() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0))
                    .with_sub_session("sub")
                    .with_confidence(&[("a", 0.9), ("a", 0.8)])
                    .with_missing(&[("a", 0.1)]),
            ],
        )];
        let rule = Rule::grouped_mean(&Thresholds::default(), None);
        let scope = Scope::SubSession {
            sub_session_id: "sub",
            language: "hi",
        };

        let ranked = classify(&records, &scope, &rule, Classification::Targets);

        assert_eq!(ranked.len(), 1);
        assert!(approx(ranked[0].score, 0.6));
        assert_eq!(ranked[0].user_id.as_deref(), Some("u1"));
        assert_eq!(ranked[0].session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn grouped_mean_is_independent_of_input_order() {
        let forward = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0)).with_confidence(&[("a", 0.2), ("a", 0.9)]),
                Session::new("s2", "char", "hi", at(5)).with_confidence(&[("a", 0.4)]),
            ],
        )];
        let backward = vec![learner(
            "u1",
            vec![
                Session::new("s2", "char", "hi", at(5)).with_confidence(&[("a", 0.4)]),
                Session::new("s1", "char", "hi", at(0)).with_confidence(&[("a", 0.9), ("a", 0.2)]),
            ],
        )];
        let rule = Rule::grouped_mean(&Thresholds::default(), None);
        let scope = Scope::User {
            user_id: "u1",
            language: Some("hi"),
        };

        let a = classify(&forward, &scope, &rule, Classification::Targets);
        let b = classify(&backward, &scope, &rule, Classification::Targets);

        assert_eq!(a.len(), 1);
        assert!(approx(a[0].score, 0.5));
        assert!(approx(a[0].score, b[0].score));
        assert!(a[0].session_id.is_none());
    }

    #[test]
    fn sub_session_groups_keep_sessions_and_learners_apart() {
        let records = vec![
            learner(
                "u1",
                vec![
                    Session::new("s1", "char", "hi", at(0))
                        .with_sub_session("sub")
                        .with_confidence(&[("a", 0.3)]),
                    Session::new("s2", "char", "hi", at(1))
                        .with_sub_session("sub")
                        .with_confidence(&[("a", 0.5)]),
                ],
            ),
            learner(
                "u2",
                vec![
                    Session::new("s9", "char", "hi", at(2))
                        .with_sub_session("sub")
                        .with_confidence(&[("a", 0.1)]),
                ],
            ),
        ];
        let rule = Rule::grouped_mean(&Thresholds::default(), None);
        let scope = Scope::SubSession {
            sub_session_id: "sub",
            language: "hi",
        };

        let ranked = classify(&records, &scope, &rule, Classification::Targets);

        let keys: Vec<_> = ranked
            .iter()
            .map(|r| (r.user_id.as_deref(), r.session_id.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some("u2"), Some("s9")),
                (Some("u1"), Some("s1")),
                (Some("u1"), Some("s2")),
            ]
        );
    }

    #[test]
    fn empty_scope_classifies_nothing() {
        let records: Vec<LearnerRecord> = Vec::new();
        let thresholds = Thresholds::default();

        for rule in [
            Rule::rolling(&thresholds),
            Rule::grouped_mean(&thresholds, None),
        ] {
            for kind in [Classification::Targets, Classification::Familiarity] {
                assert!(classify(&records, &session_scope("s1"), &rule, kind).is_empty());
            }
        }
    }

    #[test]
    fn classification_is_repeatable() {
        let records = vec![learner(
            "u1",
            vec![
                Session::new("s1", "char", "hi", at(0))
                    .with_confidence(&[("a", 0.4), ("b", 0.2), ("a", 0.7)])
                    .with_missing(&[("z", 0.3)]),
            ],
        )];
        let rule = Rule::rolling(&Thresholds::default());
        let scope = session_scope("s1");

        let first = classify(&records, &scope, &rule, Classification::Targets);
        let second = classify(&records, &scope, &rule, Classification::Targets);

        assert_eq!(first, second);
    }
}
