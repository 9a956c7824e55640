//! Status snapshots for the query API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalysisJob, JobId, JobState};

/// Coherent, read-only view of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub subject_id: String,
    pub state: JobState,
    /// Human-readable message derived from `state`
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message shown to users for a state. Pure, no side effects.
pub fn human_message(state: JobState, error_detail: Option<&str>) -> String {
    match state {
        JobState::Pending => "Analysis request received, waiting to start".to_string(),
        JobState::Processing => "Video is being analyzed".to_string(),
        JobState::Completed => "Analysis complete".to_string(),
        JobState::Failed => match error_detail {
            Some(detail) if !detail.is_empty() => format!("Analysis failed: {}", detail),
            _ => "Analysis failed".to_string(),
        },
    }
}

impl From<&AnalysisJob> for JobStatusView {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            job_id: job.id.clone(),
            subject_id: job.subject_id.clone(),
            state: job.state,
            message: human_message(job.state, job.error_detail.as_deref()),
            advisory: job.advisory.clone(),
            created_at: job.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobUpdate;

    #[test]
    fn test_messages_by_state() {
        assert!(human_message(JobState::Pending, None).contains("waiting"));
        assert!(human_message(JobState::Processing, None).contains("analyzed"));
        assert_eq!(human_message(JobState::Completed, None), "Analysis complete");
        assert_eq!(human_message(JobState::Failed, None), "Analysis failed");
        assert_eq!(
            human_message(JobState::Failed, Some("decode failed")),
            "Analysis failed: decode failed"
        );
    }

    #[test]
    fn test_view_from_failed_job() {
        let mut job = AnalysisJob::new("subject-9", "Demo day", "owner-9");
        job.apply(&JobUpdate::failed("decode failed")).unwrap();

        let view = JobStatusView::from(&job);
        assert_eq!(view.subject_id, "subject-9");
        assert_eq!(view.state, JobState::Failed);
        assert!(view.message.contains("decode failed"));
        assert_eq!(view.created_at, job.created_at);
    }
}
