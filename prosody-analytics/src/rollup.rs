//! Session rollup: distinct sessions of a learner with record counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::model::LearnerRecord;

/// One distinct session id and how many entries carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total_records: usize,
    /// Creation time of the first entry appended for this session.
    pub first_created_at: DateTime<Utc>,
}

/// Distinct sessions sorted by `session_id` descending.
///
/// The sort is lexicographic on the stored identifier, which is only
/// chronological when identifiers happen to be time-ordered.
pub fn summarize_sessions(record: &LearnerRecord) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> =
        aggregate::group_indices(&record.sessions, |s| s.session_id.as_str())
            .into_iter()
            .map(|(session_id, indices)| SessionSummary {
                session_id: session_id.to_string(),
                total_records: indices.len(),
                first_created_at: record.sessions[indices[0]].created_at,
            })
            .collect();

    summaries.sort_by(|a, b| b.session_id.cmp(&a.session_id));
    summaries
}

/// Session ids of the first `limit` summaries. With `calculate_milestone`,
/// sessions with fewer than `min_records` entries are dropped after the limit
/// is applied.
pub fn session_rollup(
    record: &LearnerRecord,
    limit: usize,
    calculate_milestone: bool,
    min_records: usize,
) -> Vec<String> {
    summarize_sessions(record)
        .into_iter()
        .take(limit)
        .filter(|summary| !calculate_milestone || summary.total_records >= min_records)
        .map(|summary| summary.session_id)
        .collect()
}
