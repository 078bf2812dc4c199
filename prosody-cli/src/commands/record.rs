//! Record commands: append sessions and milestones, upsert feedback, and
//! load reference tokens.

use std::io::Read;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use prosody_analytics::{AnalyticsConfig, FeedbackEntry, MilestoneEntry, Session, TokenMapping};
use tracing::info;

use super::open;

/// Record arguments
#[derive(Debug, Args)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub command: RecordCommand,
}

/// Record subcommands
#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// Append a practice session to a learner's history
    Session {
        /// Learner ID
        #[arg(short, long)]
        user: String,

        /// Session as JSON (reads from stdin if omitted)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Append a milestone entry to an existing learner
    Milestone {
        /// Learner ID
        #[arg(short, long)]
        user: String,

        /// Milestone entry as JSON (reads from stdin if omitted)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Set reviewer feedback for a token in a session
    Feedback {
        /// Learner ID
        #[arg(short, long)]
        user: String,

        /// Session ID
        #[arg(short, long)]
        session: String,

        /// Token the feedback applies to
        #[arg(short, long)]
        token: String,

        /// Feedback value (0 rejects the token)
        #[arg(long)]
        value: i64,
    },

    /// Add a reference token for a language
    Mapping {
        /// Language code
        #[arg(short, long)]
        language: String,

        /// Reference token
        #[arg(short, long)]
        token: String,

        /// Display hexcode for the token
        #[arg(long)]
        hexcode: Option<String>,
    },
}

/// Run the record command
pub async fn run(args: RecordArgs, config: &AnalyticsConfig) -> Result<()> {
    let analytics = open(config).await?;

    match args.command {
        RecordCommand::Session { user, data } => {
            let payload = read_payload(data)?;
            let session: Session =
                serde_json::from_str(&payload).context("Failed to parse session JSON")?;
            analytics.record_session(&user, &session).await?;
            info!(user = %user, session_id = %session.session_id, "recorded session");
        }
        RecordCommand::Milestone { user, data } => {
            let payload = read_payload(data)?;
            let entry: MilestoneEntry =
                serde_json::from_str(&payload).context("Failed to parse milestone JSON")?;
            analytics.record_milestone(&user, &entry).await?;
            info!(user = %user, level = %entry.milestone_level, "recorded milestone");
        }
        RecordCommand::Feedback {
            user,
            session,
            token,
            value,
        } => {
            let entry = FeedbackEntry {
                user_id: user,
                session_id: session,
                token,
                feedback: value,
            };
            analytics.record_feedback(&entry).await?;
            info!(?entry, "recorded feedback");
        }
        RecordCommand::Mapping {
            language,
            token,
            hexcode,
        } => {
            let mapping = TokenMapping {
                language,
                token,
                hexcode,
            };
            analytics.record_token_mapping(&mapping).await?;
            info!(language = %mapping.language, token = %mapping.token, "recorded token mapping");
        }
    }

    Ok(())
}

/// Payload from `--data`, or stdin when omitted.
fn read_payload(data: Option<String>) -> Result<String> {
    match data {
        Some(data) => Ok(data),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        record: RecordArgs,
    }

    #[test]
    fn parse_session_with_inline_data() {
        let cli =
            TestCli::try_parse_from(["test", "session", "--user", "u1", "--data", "{}"]).unwrap();

        match cli.record.command {
            RecordCommand::Session { user, data } => {
                assert_eq!(user, "u1");
                assert_eq!(data, Some("{}".to_string()));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_milestone_without_data_for_stdin() {
        let cli = TestCli::try_parse_from(["test", "milestone", "-u", "u1"]).unwrap();

        match cli.record.command {
            RecordCommand::Milestone { data, .. } => assert!(data.is_none()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_feedback() {
        let cli = TestCli::try_parse_from([
            "test", "feedback", "--user", "u1", "--session", "s1", "--token", "क", "--value", "0",
        ])
        .unwrap();

        match cli.record.command {
            RecordCommand::Feedback {
                session,
                token,
                value,
                ..
            } => {
                assert_eq!(session, "s1");
                assert_eq!(token, "क");
                assert_eq!(value, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn feedback_requires_a_value() {
        let result = TestCli::try_parse_from([
            "test", "feedback", "--user", "u1", "--session", "s1", "--token", "a",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn session_json_accepts_stored_field_names() {
        let json = r#"{
            "session_id": "s1",
            "sub_session_id": "sub1",
            "contentType": "Word",
            "language": "en",
            "createdAt": "2024-05-01T10:00:00Z",
            "confidence_scores": [{"token": "cat", "confidence_score": 0.7}]
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.content_type, "Word");
        assert_eq!(session.confidence_scores[0].token, "cat");
    }

    #[test]
    fn inline_payload_is_returned_unchanged() {
        assert_eq!(read_payload(Some("{}".into())).unwrap(), "{}");
    }
}
