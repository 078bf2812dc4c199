//! Query commands. Every result is printed as JSON.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use prosody_analytics::{AnalyticsConfig, LearnerAnalytics};

use super::{open, print_json};

/// Query arguments
#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

/// Query subcommands
#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Tokens scoring below threshold
    Targets(ClassifyArgs),

    /// Tokens scoring at or above threshold
    Familiarity(ClassifyArgs),

    /// Mean confidence per token
    Mean(LearnerScopeArgs),

    /// Median confidence per token
    Median(LearnerScopeArgs),

    /// Current milestone of a learner in a language
    Milestone {
        /// Learner ID
        #[arg(short, long)]
        user: String,

        /// Language code
        #[arg(short, long)]
        language: String,
    },

    /// Distinct sessions of a learner, most recent identifier first
    Rollup {
        /// Learner ID
        #[arg(short, long)]
        user: String,

        /// Maximum number of sessions
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Drop sessions with too few records for a milestone
        #[arg(long)]
        calculate_milestone: bool,
    },

    /// Tokens every reviewer rejected
    Rejected(LearnerScopeArgs),

    /// Mean fluency score of a sub-session
    Fluency {
        /// Sub-session ID
        #[arg(long)]
        sub_session: String,

        /// Language code
        #[arg(short, long)]
        language: String,
    },

    /// A learner's stored record
    Learner {
        /// Learner ID
        #[arg(short, long)]
        user: String,
    },

    /// All learner records, or those holding a session
    Learners {
        /// Only learners with this session ID
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Reference tokens of a language
    Tokens {
        /// Language code
        #[arg(short, long)]
        language: String,

        /// Print full mapping rows instead of bare tokens
        #[arg(long)]
        mappings: bool,
    },
}

/// Exactly one of session, sub-session or learner.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ScopeArgs {
    /// Session ID
    #[arg(long)]
    pub session: Option<String>,

    /// Sub-session ID (requires --language)
    #[arg(long)]
    pub sub_session: Option<String>,

    /// Learner ID
    #[arg(long)]
    pub user: Option<String>,
}

/// Arguments shared by the classification queries
#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Language code
    #[arg(short, long)]
    pub language: Option<String>,

    /// Content type (char, word, sentence, paragraph); "word" lowers the threshold
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Exactly one of session or learner.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct LearnerScopeArgs {
    /// Session ID
    #[arg(long)]
    pub session: Option<String>,

    /// Learner ID
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum QueryScope {
    Session(String),
    SubSession(String),
    User(String),
}

impl ScopeArgs {
    fn into_scope(self) -> Option<QueryScope> {
        self.session
            .map(QueryScope::Session)
            .or(self.sub_session.map(QueryScope::SubSession))
            .or(self.user.map(QueryScope::User))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LearnerScope {
    Session(String),
    User(String),
}

impl LearnerScopeArgs {
    fn into_scope(self) -> Option<LearnerScope> {
        self.session
            .map(LearnerScope::Session)
            .or(self.user.map(LearnerScope::User))
    }
}

/// Run the query command
pub async fn run(args: QueryArgs, config: &AnalyticsConfig) -> Result<()> {
    let analytics = open(config).await?;

    match args.command {
        QueryCommand::Targets(args) => classify(&analytics, args, true).await,
        QueryCommand::Familiarity(args) => classify(&analytics, args, false).await,
        QueryCommand::Mean(args) => match learner_scope(args)? {
            LearnerScope::Session(id) => print_json(&analytics.mean_by_session(&id).await?),
            LearnerScope::User(id) => print_json(&analytics.mean_by_user(&id).await?),
        },
        QueryCommand::Median(args) => match learner_scope(args)? {
            LearnerScope::Session(id) => print_json(&analytics.median_by_session(&id).await?),
            LearnerScope::User(id) => print_json(&analytics.median_by_user(&id).await?),
        },
        QueryCommand::Milestone { user, language } => {
            print_json(&analytics.current_milestone(&user, &language).await?)
        }
        QueryCommand::Rollup {
            user,
            limit,
            calculate_milestone,
        } => print_json(
            &analytics
                .session_rollup(&user, limit, calculate_milestone)
                .await?,
        ),
        QueryCommand::Rejected(args) => match learner_scope(args)? {
            LearnerScope::Session(id) => {
                print_json(&analytics.rejected_tokens_by_session(&id).await?)
            }
            LearnerScope::User(id) => print_json(&analytics.rejected_tokens_by_user(&id).await?),
        },
        QueryCommand::Fluency {
            sub_session,
            language,
        } => print_json(
            &analytics
                .fluency_by_sub_session(&sub_session, &language)
                .await?,
        ),
        QueryCommand::Learner { user } => print_json(&analytics.learner(&user).await?),
        QueryCommand::Learners { session } => match session {
            Some(session_id) => print_json(&analytics.learners_by_session(&session_id).await?),
            None => print_json(&analytics.learners().await?),
        },
        QueryCommand::Tokens { language, mappings } => {
            if mappings {
                print_json(&analytics.token_mappings(&language).await?)
            } else {
                print_json(&analytics.expected_tokens(&language).await?)
            }
        }
    }
}

async fn classify(analytics: &LearnerAnalytics, args: ClassifyArgs, targets: bool) -> Result<()> {
    let ClassifyArgs {
        scope,
        language,
        content_type,
    } = args;
    let scope = scope
        .into_scope()
        .context("One of --session, --sub-session or --user is required")?;
    let language = language.as_deref();
    let content_type = content_type.as_deref();

    let ranked = match scope {
        QueryScope::Session(id) => {
            if targets {
                analytics.targets_by_session(&id, language).await?
            } else {
                if language.is_some() {
                    bail!("--language is not supported for session familiarity");
                }
                analytics.familiarity_by_session(&id).await?
            }
        }
        QueryScope::SubSession(id) => {
            let language = language.context("--language is required with --sub-session")?;
            if targets {
                analytics
                    .targets_by_sub_session(&id, content_type, language)
                    .await?
            } else {
                analytics
                    .familiarity_by_sub_session(&id, content_type, language)
                    .await?
            }
        }
        QueryScope::User(id) => {
            if targets {
                analytics.targets_by_user(&id, language, content_type).await?
            } else {
                analytics
                    .familiarity_by_user(&id, language, content_type)
                    .await?
            }
        }
    };

    print_json(&ranked)
}

fn learner_scope(args: LearnerScopeArgs) -> Result<LearnerScope> {
    args.into_scope()
        .context("One of --session or --user is required")
}
