//! Completion/failure events consumed by notification sinks.

use serde::{Deserialize, Serialize};

use crate::{AnalysisJob, JobId};

/// Published exactly once per job when it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEvent {
    pub job_id: JobId,
    pub owner_id: String,
    pub subject_title: String,
    pub subject_id: String,
    pub success: bool,
}

impl AnalysisEvent {
    pub fn completed(job: &AnalysisJob) -> Self {
        Self::from_job(job, true)
    }

    pub fn failed(job: &AnalysisJob) -> Self {
        Self::from_job(job, false)
    }

    fn from_job(job: &AnalysisJob, success: bool) -> Self {
        Self {
            job_id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            subject_title: job.subject_title.clone(),
            subject_id: job.subject_id.clone(),
            success,
        }
    }
}
