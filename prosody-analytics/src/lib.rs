//! Token-level pronunciation analytics for prosody learners.
//!
//! Learners submit practice sessions carrying per-token confidence scores.
//! This crate stores that append-only history and derives practice signals
//! from it:
//!
//! - **Targets** and **familiarity**: tokens below or at/above a confidence
//!   threshold, per session, sub-session, or learner ([`classify`])
//! - **Vectors**: per-token mean and median confidence ([`vectors`])
//! - **Milestones**: the current milestone level per language ([`milestone`])
//! - **Rollups**: distinct sessions with record counts ([`rollup`])
//! - **Feedback**: tokens a reviewer rejected ([`feedback`])
//!
//! # Architecture
//!
//! - **Storage** ([`LearnerStore`], [`FeedbackStore`], [`ReferenceStore`]) holds
//!   records; [`MemoryStore`] and [`TursoStore`] implement all three
//! - **Reductions** are pure functions over borrowed [`LearnerRecord`]s
//! - **Facade** ([`LearnerAnalytics`]) reads a scope from storage and reduces it

pub mod aggregate;
mod analytics;
pub mod classify;
mod config;
mod error;
pub mod feedback;
pub mod milestone;
mod model;
pub mod rollup;
pub mod storage;
pub mod vectors;

// Facade
pub use analytics::LearnerAnalytics;

// Configuration
pub use config::{
    AnalyticsConfig, DEFAULT_MIN_RECORDS_FOR_MILESTONE, DEFAULT_THRESHOLD, RollupConfig,
    StorageConfig, Thresholds, WORD_THRESHOLD,
};

// Errors
pub use error::{Error, Result};

// Data model
pub use model::{
    CharEdits, CountDiff, EditOperations, ErrorRate, FeedbackEntry, LearnerRecord,
    MilestoneEntry, Session, SessionDiagnostics, SilencePause, Substitution, Substitutions,
    TokenMapping, TokenScore,
};

// Query results
pub use aggregate::Scope;
pub use classify::{Classification, RankedToken, Rule};
pub use feedback::RejectedToken;
pub use milestone::CurrentMilestone;
pub use rollup::SessionSummary;
pub use vectors::{TokenMean, TokenMedian};

// Storage
pub use storage::{FeedbackStore, LearnerStore, MemoryStore, ReferenceStore, TursoStore};
