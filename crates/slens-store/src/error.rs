//! Store error types.

use slens_models::{InvalidTransition, JobState};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job {job_id} is {actual}, expected {expected}")]
    StaleState {
        job_id: String,
        expected: JobState,
        actual: JobState,
    },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// The transition was refused because of the job's current state
    /// (terminal, or not the expected predecessor).
    pub fn is_rejected_transition(&self) -> bool {
        matches!(
            self,
            StoreError::StaleState { .. } | StoreError::InvalidTransition(_)
        )
    }
}
