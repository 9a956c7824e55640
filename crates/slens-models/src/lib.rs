//! Shared data models for the SpeechLens analysis pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and their state machine
//! - Cached analysis results and their expiry
//! - Completion/failure events published to notification sinks
//! - Status snapshots served to the presentation layer
//! - Target durations in `mm:ss` form

pub mod breakdown;
pub mod event;
pub mod job;
pub mod result;
pub mod status;
pub mod target_time;

// Re-export common types
pub use breakdown::AnalysisBreakdown;
pub use event::AnalysisEvent;
pub use job::{AnalysisJob, InvalidTransition, JobId, JobState, JobUpdate};
pub use result::{AnalysisPayload, CachedResult, RESULT_TTL_DAYS};
pub use status::{human_message, JobStatusView};
pub use target_time::{TargetTime, TargetTimeError};
