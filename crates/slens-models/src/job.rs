//! Analysis job definitions and lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Analysis job state.
///
/// ```text
/// PENDING ──► PROCESSING ──► COMPLETED
///    │             │
///    └──► FAILED ◄─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job record created, transfer not yet finished
    #[default]
    Pending,
    /// Media handed to the remote worker, waiting for a terminal status
    Processing,
    /// Result received and cached
    Completed,
    /// Transfer or analysis failed
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Processing => "PROCESSING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }

    /// Check if this is a terminal state (no more transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested transition, carrying the data the target state needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobUpdate {
    /// Move to `PROCESSING`.
    ///
    /// `correlation_id` is absent when the transfer hit a transient
    /// connectivity failure; `advisory` then explains the situation.
    Processing {
        correlation_id: Option<String>,
        advisory: Option<String>,
    },
    /// Move to `COMPLETED`.
    Completed,
    /// Move to `FAILED` with an error detail.
    Failed { error: String },
}

impl JobUpdate {
    pub fn processing(correlation_id: impl Into<String>) -> Self {
        Self::Processing {
            correlation_id: Some(correlation_id.into()),
            advisory: None,
        }
    }

    pub fn processing_with_advisory(advisory: impl Into<String>) -> Self {
        Self::Processing {
            correlation_id: None,
            advisory: Some(advisory.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// State the job ends up in once this update is applied.
    pub fn target_state(&self) -> JobState {
        match self {
            JobUpdate::Processing { .. } => JobState::Processing,
            JobUpdate::Completed => JobState::Completed,
            JobUpdate::Failed { .. } => JobState::Failed,
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Durable record of one analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisJob {
    /// Unique job ID
    pub id: JobId,

    /// Entity being analyzed (presentation/video record)
    pub subject_id: String,

    /// Display title of the subject, carried into events
    pub subject_title: String,

    /// User notified when the job finishes
    pub owner_id: String,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Failure detail (only in `FAILED`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Non-fatal advisory attached while `PROCESSING`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,

    /// Id issued by the remote worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Creation timestamp, never mutated
    pub created_at: DateTime<Utc>,

    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,

    /// When the job reached `COMPLETED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    /// Create a new `PENDING` job.
    pub fn new(
        subject_id: impl Into<String>,
        subject_title: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            subject_id: subject_id.into(),
            subject_title: subject_title.into(),
            owner_id: owner_id.into(),
            state: JobState::Pending,
            error_detail: None,
            advisory: None,
            correlation_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a transition in place.
    ///
    /// Leaves the job untouched when the edge is not part of the state machine.
    pub fn apply(&mut self, update: &JobUpdate) -> Result<(), InvalidTransition> {
        let to = update.target_state();
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }

        let now = Utc::now();
        match update {
            JobUpdate::Processing {
                correlation_id,
                advisory,
            } => {
                self.correlation_id = correlation_id.clone();
                self.advisory = advisory.clone();
            }
            JobUpdate::Completed => {
                self.advisory = None;
                self.completed_at = Some(now);
            }
            JobUpdate::Failed { error } => {
                self.advisory = None;
                self.error_detail = Some(error.clone());
            }
        }
        self.state = to;
        self.updated_at = now;
        Ok(())
    }

    /// `PROCESSING` and created before `cutoff`.
    pub fn is_stuck(&self, cutoff: DateTime<Utc>) -> bool {
        self.state == JobState::Processing && self.created_at < cutoff
    }

    /// Terminal and created before `cutoff`.
    pub fn is_purgeable(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_terminal() && self.created_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> AnalysisJob {
        AnalysisJob::new("subject-1", "Quarterly pitch", "user-1")
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.state, JobState::Pending);
        assert!(job.error_detail.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        let created_at = job.created_at;

        job.apply(&JobUpdate::processing("remote-42")).unwrap();
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.correlation_id.as_deref(), Some("remote-42"));

        job.apply(&JobUpdate::Completed).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.created_at, created_at);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut job = job();
        job.apply(&JobUpdate::failed("upload rejected")).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error_detail.as_deref(), Some("upload rejected"));
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut job = job();
        job.apply(&JobUpdate::processing("remote-1")).unwrap();
        job.apply(&JobUpdate::failed("decode failed")).unwrap();
        let snapshot = job.clone();

        let err = job.apply(&JobUpdate::Completed).unwrap_err();
        assert_eq!(err.from, JobState::Failed);
        assert_eq!(err.to, JobState::Completed);
        assert!(job.apply(&JobUpdate::processing("remote-2")).is_err());
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut job = job();
        assert!(job.apply(&JobUpdate::Completed).is_err());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_advisory_cleared_on_terminal() {
        let mut job = job();
        job.apply(&JobUpdate::processing_with_advisory("service warming up"))
            .unwrap();
        assert!(job.correlation_id.is_none());
        assert_eq!(job.advisory.as_deref(), Some("service warming up"));

        job.apply(&JobUpdate::failed("gave up")).unwrap();
        assert!(job.advisory.is_none());
    }

    #[test]
    fn test_stuck_and_purgeable() {
        let mut job = job();
        job.created_at = Utc::now() - chrono::Duration::hours(2);
        let cutoff = Utc::now() - chrono::Duration::hours(1);

        assert!(!job.is_stuck(cutoff));
        job.apply(&JobUpdate::processing("r")).unwrap();
        assert!(job.is_stuck(cutoff));
        assert!(!job.is_purgeable(cutoff));

        job.apply(&JobUpdate::Completed).unwrap();
        assert!(!job.is_stuck(cutoff));
        assert!(job.is_purgeable(cutoff));
        assert!(!job.is_purgeable(job.created_at));
    }

    #[test]
    fn test_state_serde_matches_storage_name() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
            assert_eq!(serde_json::from_str::<JobState>(&json).unwrap(), state);
        }
        assert!(serde_json::from_str::<JobState>("\"STALE\"").is_err());
    }
}
