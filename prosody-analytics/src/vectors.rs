//! Per-token mean and median confidence vectors.

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Scope, ScoreSource};
use crate::model::LearnerRecord;

/// Mean recognized confidence of one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMean {
    pub token: String,
    pub mean: f64,
}

/// Median recognized confidence of one token; `None` for an empty group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMedian {
    pub token: String,
    pub median: Option<f64>,
}

/// Arithmetic mean, `None` for no values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of the values sorted ascending, `None` for no values.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Recognized scores grouped by (learner, token) in order of first appearance.
fn learner_token_groups<'a>(
    records: &'a [LearnerRecord],
    scope: &Scope<'_>,
) -> Vec<(&'a str, Vec<f64>)> {
    let observations = aggregate::collect(records, scope, ScoreSource::Recognized);
    aggregate::group_indices(&observations, |o| (o.user_id, o.token))
        .into_iter()
        .map(|((_, token), indices)| {
            let values = indices.iter().map(|&i| observations[i].score).collect();
            (token, values)
        })
        .collect()
}

/// Mean confidence per token for a session or user scope.
pub fn mean_vector(records: &[LearnerRecord], scope: &Scope<'_>) -> Vec<TokenMean> {
    learner_token_groups(records, scope)
        .into_iter()
        .filter_map(|(token, values)| {
            mean(&values).map(|mean| TokenMean {
                token: token.to_string(),
                mean,
            })
        })
        .collect()
}

/// Median confidence per token for a session or user scope.
pub fn median_vector(records: &[LearnerRecord], scope: &Scope<'_>) -> Vec<TokenMedian> {
    learner_token_groups(records, scope)
        .into_iter()
        .map(|(token, values)| TokenMedian {
            token: token.to_string(),
            median: median(&values),
        })
        .collect()
}
