//! Job submission and query handlers.

use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use slens_models::{AnalysisJob, AnalysisPayload, JobId, JobState, JobStatusView, TargetTime};
use slens_pipeline::SubmitRequest;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default age for the stuck-job query (1 hour).
const DEFAULT_STUCK_AGE_SECS: i64 = 60 * 60;
/// Default age for the purge query (7 days).
const DEFAULT_PURGE_AGE_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub subject_id: String,
    #[serde(default)]
    pub subject_title: String,
    pub owner_id: String,
    /// Path of the media file on the server's filesystem
    pub media_path: PathBuf,
    /// Target presentation duration (`mm:ss`)
    #[serde(default)]
    pub target_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub state: JobState,
}

/// `POST /api/jobs`
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let target_time = body
        .target_time
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<TargetTime>())
        .transpose()
        .map_err(|e| ApiError::bad_request(format!("invalid target_time: {}", e)))?;

    let job_id = state
        .orchestrator
        .submit(SubmitRequest {
            subject_id: body.subject_id,
            subject_title: body.subject_title,
            owner_id: body.owner_id,
            media_path: body.media_path,
            target_time,
        })
        .await?;

    info!(job_id = %job_id, "Analysis job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            state: JobState::Pending,
        }),
    ))
}

/// `GET /api/jobs/:id`
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let view = state
        .orchestrator
        .require_status(&JobId::from_string(job_id))
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub result: AnalysisPayload,
}

/// `GET /api/jobs/:id/result`
///
/// Served from the result cache only. Unknown jobs and jobs without a live
/// cached result are both 404, with different details.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobResultResponse>> {
    let job_id = JobId::from_string(job_id);

    match state.orchestrator.get_result(&job_id).await {
        Some(result) => Ok(Json(JobResultResponse { job_id, result })),
        None => {
            let status = state.orchestrator.require_status(&job_id).await?;
            Err(ApiError::not_found(format!(
                "no result available for job {} ({})",
                job_id, status.state
            )))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// `POST /api/jobs/:id/cancel`
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelJobResponse>> {
    let job_id = JobId::from_string(job_id);
    state.orchestrator.require_status(&job_id).await?;

    let cancelled = state.orchestrator.cancel(&job_id);
    if cancelled {
        info!(job_id = %job_id, "Analysis job cancelled");
    }
    Ok(Json(CancelJobResponse { job_id, cancelled }))
}

#[derive(Debug, Deserialize)]
pub struct AgeQuery {
    pub older_than_secs: Option<i64>,
}

impl AgeQuery {
    fn cutoff(&self, default_secs: i64) -> ApiResult<DateTime<Utc>> {
        let secs = self.older_than_secs.unwrap_or(default_secs);
        if secs < 0 {
            return Err(ApiError::bad_request("older_than_secs must not be negative"));
        }
        Duration::try_seconds(secs)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| ApiError::bad_request("older_than_secs is out of range"))
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub cutoff: DateTime<Utc>,
    pub count: usize,
    pub jobs: Vec<AnalysisJob>,
}

/// `GET /api/jobs/stuck?older_than_secs=N`
///
/// Jobs still `PROCESSING` that were created before now minus N seconds.
pub async fn list_stuck_jobs(
    State(state): State<AppState>,
    Query(query): Query<AgeQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let cutoff = query.cutoff(DEFAULT_STUCK_AGE_SECS)?;
    let jobs = state.orchestrator.stuck_jobs(cutoff).await?;
    Ok(Json(JobListResponse {
        cutoff,
        count: jobs.len(),
        jobs,
    }))
}

/// `GET /api/jobs/purgeable?older_than_secs=N`
pub async fn list_purgeable_jobs(
    State(state): State<AppState>,
    Query(query): Query<AgeQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let cutoff = query.cutoff(DEFAULT_PURGE_AGE_SECS)?;
    let jobs = state.orchestrator.terminal_jobs_before(cutoff).await?;
    Ok(Json(JobListResponse {
        cutoff,
        count: jobs.len(),
        jobs,
    }))
}
