//! Current milestone resolution.
//!
//! Milestone entries carry no language of their own. An entry's language is
//! the language of the first session in the same learner record sharing its
//! `sub_session_id`; entries without such a session never resolve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LearnerRecord, MilestoneEntry};

/// A milestone entry joined with its resolved language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentMilestone {
    pub user_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_session_id: Option<String>,
    pub milestone_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_milestone_level: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub language: String,
}

/// Language of the first session sharing the entry's sub-session id.
pub fn resolve_language<'a>(record: &'a LearnerRecord, entry: &MilestoneEntry) -> Option<&'a str> {
    let sub_session_id = entry.sub_session_id.as_deref()?;
    record
        .sessions
        .iter()
        .find(|s| s.sub_session_id.as_deref() == Some(sub_session_id))
        .map(|s| s.language.as_str())
}

/// Most recently created entry whose resolved language matches.
///
/// Among entries created at the same instant the earliest appended wins.
pub fn current_milestone(record: &LearnerRecord, language: &str) -> Option<CurrentMilestone> {
    let mut latest: Option<&MilestoneEntry> = None;

    for entry in &record.milestones {
        if resolve_language(record, entry) != Some(language) {
            continue;
        }
        if latest.is_none_or(|current| entry.created_at > current.created_at) {
            latest = Some(entry);
        }
    }

    latest.map(|entry| CurrentMilestone {
        user_id: record.user_id.clone(),
        session_id: entry.session_id.clone(),
        sub_session_id: entry.sub_session_id.clone(),
        milestone_level: entry.milestone_level.clone(),
        sub_milestone_level: entry.sub_milestone_level.clone(),
        created_at: entry.created_at,
        language: language.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 12, 0, 0).unwrap()
    }

    fn entry(sub_session_id: Option<&str>, level: &str, created_at: DateTime<Utc>) -> MilestoneEntry {
        MilestoneEntry {
            session_id: "s".into(),
            sub_session_id: sub_session_id.map(str::to_string),
            milestone_level: level.into(),
            sub_milestone_level: None,
            created_at,
        }
    }

    fn record() -> LearnerRecord {
        let mut record = LearnerRecord::new("u1");
        record
            .sessions
            .push(Session::new("s1", "char", "hi", at(1)).with_sub_session("sub-hi"));
        record
            .sessions
            .push(Session::new("s2", "char", "ta", at(1)).with_sub_session("sub-ta"));
        record
            .sessions
            .push(Session::new("s3", "char", "kn", at(1)).with_sub_session("sub-hi"));
        record
    }

    #[test]
    fn resolves_language_from_first_matching_session() {
        let record = record();
        let e = entry(Some("sub-hi"), "m1", at(2));

        assert_eq!(resolve_language(&record, &e), Some("hi"));
    }

    #[test]
    fn unresolvable_entries_have_no_language() {
        let record = record();

        assert_eq!(resolve_language(&record, &entry(Some("other"), "m1", at(2))), None);
        assert_eq!(resolve_language(&record, &entry(None, "m1", at(2))), None);
    }

    #[test]
    fn returns_only_entries_in_requested_language() {
        let mut record = record();
        record.milestones.push(entry(Some("sub-hi"), "m1", at(2)));
        record.milestones.push(entry(Some("sub-ta"), "m4", at(3)));

        let current = current_milestone(&record, "hi").unwrap();

        assert_eq!(current.milestone_level, "m1");
        assert_eq!(current.language, "hi");
        assert_eq!(current.user_id, "u1");
    }

    #[test]
    fn returns_most_recent_by_created_at_not_insertion() {
        let mut record = record();
        record.milestones.push(entry(Some("sub-ta"), "m3", at(9)));
        record.milestones.push(entry(Some("sub-ta"), "m2", at(4)));

        let current = current_milestone(&record, "ta").unwrap();

        assert_eq!(current.milestone_level, "m3");
    }

    #[test]
    fn no_matching_language_yields_none() {
        let mut record = record();
        record.milestones.push(entry(Some("missing"), "m1", at(2)));

        assert!(current_milestone(&record, "hi").is_none());
        assert!(current_milestone(&LearnerRecord::new("u2"), "hi").is_none());
    }
}
