//! Job orchestration.
//!
//! [`JobOrchestrator::submit`] validates the request, records a `PENDING`
//! job and returns immediately. A background task then runs the job:
//!
//! 1. wait for a worker slot
//! 2. send the media in chunks and obtain the correlation id (`PROCESSING`)
//! 3. poll the remote worker until a terminal outcome
//! 4. finalize: `COMPLETED` + cache + best-effort breakdown + event, or
//!    `FAILED` + event
//!
//! Every transition names its expected predecessor state, and only the task
//! that wins a terminal transition publishes the job's event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use slens_analysis_client::{ChunkMetadata, ChunkUploader, StatusSource};
use slens_models::{
    AnalysisBreakdown, AnalysisEvent, AnalysisJob, AnalysisPayload, JobId, JobState,
    JobStatusView, JobUpdate, TargetTime,
};
use slens_store::{AnalysisJobStore, SubjectRecordStore};
use tokio::sync::{watch, Semaphore};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, TransferError};
use crate::logging::JobLogger;
use crate::metrics;
use crate::notify::NotificationSink;
use crate::poller::{cancelled, PollOutcome, StatusPoller};
use crate::result_cache::ResultCache;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use crate::transfer::ChunkTransfer;

/// Advisory attached when the remote worker could not be reached.
const STARTUP_ADVISORY: &str =
    "Analysis service is starting up. The video was not analyzed yet; check back shortly.";

/// How long `shutdown` waits for running jobs to stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A request to analyze one media file.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub subject_id: String,
    pub subject_title: String,
    pub owner_id: String,
    pub media_path: PathBuf,
    pub target_time: Option<TargetTime>,
}

/// Entry point of the analysis pipeline. Cheap to clone.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn AnalysisJobStore>,
    records: Arc<dyn SubjectRecordStore>,
    cache: Arc<ResultCache>,
    transfer: ChunkTransfer,
    poller: StatusPoller,
    notifier: Arc<dyn NotificationSink>,
    slots: Arc<Semaphore>,
    active: Mutex<HashMap<JobId, watch::Sender<bool>>>,
    closing: AtomicBool,
    persistence_retry: RetryConfig,
}

impl JobOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn AnalysisJobStore>,
        records: Arc<dyn SubjectRecordStore>,
        uploader: Arc<dyn ChunkUploader>,
        status: Arc<dyn StatusSource>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let cache = ResultCache::with_std_ttl(config.result_ttl, config.cache_sweep_every);

        Self {
            inner: Arc::new(Inner {
                store,
                records,
                cache: Arc::new(cache),
                transfer: ChunkTransfer::new(uploader, config.chunk_size, config.work_dir.clone()),
                poller: StatusPoller::new(status, config.poll_interval, config.max_poll_attempts),
                notifier,
                slots: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
                active: Mutex::new(HashMap::new()),
                closing: AtomicBool::new(false),
                persistence_retry: RetryConfig::new("save_breakdown"),
            }),
        }
    }

    /// Create a job for `request` and start it in the background.
    ///
    /// Invalid requests and unreadable or empty media fail here, before any
    /// job record exists. Everything after this returns is reported through
    /// the job's status and event.
    pub async fn submit(&self, request: SubmitRequest) -> PipelineResult<JobId> {
        if self.inner.closing.load(Ordering::SeqCst) {
            return Err(PipelineError::ShuttingDown);
        }
        if request.subject_id.trim().is_empty() {
            return Err(PipelineError::invalid_request("subject_id is required"));
        }
        if request.owner_id.trim().is_empty() {
            return Err(PipelineError::invalid_request("owner_id is required"));
        }

        let media = tokio::fs::metadata(&request.media_path).await.map_err(|e| {
            PipelineError::invalid_request(format!(
                "media file {} is not readable: {}",
                request.media_path.display(),
                e
            ))
        })?;
        if !media.is_file() {
            return Err(PipelineError::invalid_request(format!(
                "media path {} is not a file",
                request.media_path.display()
            )));
        }
        if media.len() == 0 {
            return Err(TransferError::EmptyFile(request.media_path.display().to_string()).into());
        }

        let job = AnalysisJob::new(
            request.subject_id,
            request.subject_title,
            request.owner_id,
        );
        self.inner.store.create(&job).await?;
        metrics::record_job_submitted();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.inner.active_jobs().insert(job.id.clone(), cancel_tx);

        let logger = JobLogger::new(&job.id, "analysis");
        logger.log_start(&format!(
            "subject {} ({} bytes)",
            job.subject_id,
            media.len()
        ));

        let metadata = ChunkMetadata {
            target_time: request.target_time,
        };
        let span = logger.create_span();
        let job_id = job.id.clone();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            inner
                .run_job(job, request.media_path, metadata, cancel_rx, logger)
                .instrument(span),
        );

        Ok(job_id)
    }

    /// Snapshot of a job, or `None` for unknown ids.
    pub async fn get_status(&self, job_id: &JobId) -> PipelineResult<Option<JobStatusView>> {
        let job = self.inner.store.get(job_id).await?;
        Ok(job.as_ref().map(JobStatusView::from))
    }

    /// Like [`get_status`](Self::get_status), failing with `NotFound`.
    pub async fn require_status(&self, job_id: &JobId) -> PipelineResult<JobStatusView> {
        self.get_status(job_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(job_id.as_str()))
    }

    /// Full job record, or `None` for unknown ids.
    pub async fn get_job(&self, job_id: &JobId) -> PipelineResult<Option<AnalysisJob>> {
        Ok(self.inner.store.get(job_id).await?)
    }

    /// Result payload, served from the cache only.
    pub async fn get_result(&self, job_id: &JobId) -> Option<AnalysisPayload> {
        self.inner.cache.get(job_id).await.map(|entry| entry.payload)
    }

    pub async fn cache_size(&self) -> usize {
        self.inner.cache.size().await
    }

    /// Drop every cached result. Returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        self.inner.cache.clear().await
    }

    pub async fn sweep_cache(&self) -> usize {
        self.inner.cache.sweep_expired().await
    }

    /// Jobs still `PROCESSING` that were created before `cutoff`.
    pub async fn stuck_jobs(&self, cutoff: DateTime<Utc>) -> PipelineResult<Vec<AnalysisJob>> {
        Ok(self.inner.store.stuck_jobs(cutoff).await?)
    }

    /// Terminal jobs created before `cutoff`, for external purging.
    pub async fn terminal_jobs_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> PipelineResult<Vec<AnalysisJob>> {
        Ok(self.inner.store.terminal_jobs_before(cutoff).await?)
    }

    /// Stop a running job. Its state is left as is and no event is published.
    ///
    /// Returns `false` if the job is not running.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.inner.active_jobs().get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Number of jobs with a live background task.
    pub fn active_jobs(&self) -> usize {
        self.inner.active_jobs().len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    /// Refuse new submissions, cancel running jobs and wait briefly for them
    /// to stop.
    pub async fn shutdown(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.slots.close();

        let running = {
            let active = self.inner.active_jobs();
            for tx in active.values() {
                let _ = tx.send(true);
            }
            active.len()
        };
        tracing::info!(running, "Pipeline shutting down");

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while self.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.active_jobs(),
                "Jobs still running after shutdown grace period"
            );
        }
    }
}

/// Removes the job from the active set when its task ends, however it ends.
struct ActiveGuard<'a> {
    inner: &'a Inner,
    job_id: JobId,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.inner.active_jobs().remove(&self.job_id);
    }
}

impl Inner {
    fn active_jobs(&self) -> MutexGuard<'_, HashMap<JobId, watch::Sender<bool>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_job(
        self: Arc<Self>,
        job: AnalysisJob,
        media_path: PathBuf,
        metadata: ChunkMetadata,
        mut cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) {
        let _guard = ActiveGuard {
            inner: &self,
            job_id: job.id.clone(),
        };

        let _permit = tokio::select! {
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    logger.log_warning("worker pool closed before the job started");
                    return;
                }
            },
            _ = cancelled(&mut cancel) => {
                logger.log_warning("cancelled before the job started");
                return;
            }
        };

        let logger = logger.with_operation("chunk_transfer");
        let transfer = tokio::select! {
            result = self.transfer.send(&media_path, &metadata) => result,
            _ = cancelled(&mut cancel) => {
                logger.log_warning("cancelled during transfer; job left PENDING");
                return;
            }
        };

        let correlation_id = match transfer {
            Ok(receipt) => {
                logger.log_progress(&format!(
                    "{} chunks sent, correlation id {}",
                    receipt.total_chunks, receipt.correlation_id
                ));
                let update = JobUpdate::processing(receipt.correlation_id.clone());
                if let Err(e) = self.store.transition(&job.id, JobState::Pending, &update).await {
                    logger.log_error(&format!("failed to record PROCESSING: {}", e));
                    return;
                }
                receipt.correlation_id
            }
            Err(e) if e.is_transient() => {
                logger.log_warning(&format!("analysis service unreachable: {}", e));
                let update = JobUpdate::processing_with_advisory(STARTUP_ADVISORY);
                if let Err(e) = self.store.transition(&job.id, JobState::Pending, &update).await {
                    logger.log_error(&format!("failed to record advisory: {}", e));
                }
                return;
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                self.fail(&job.id, JobState::Pending, e.to_string(), "transfer", &logger)
                    .await;
                return;
            }
        };

        let logger = logger.with_operation("status_poll");
        let outcome = self.poller.await_terminal(&correlation_id, &mut cancel).await;

        match outcome {
            PollOutcome::Completed(payload) => self.complete(&job.id, payload, &logger).await,
            PollOutcome::Cancelled => {
                logger.log_warning("cancelled while polling; job left PROCESSING");
            }
            other => {
                let reason = match &other {
                    PollOutcome::Failed(_) => "remote_error",
                    PollOutcome::NotFound => "not_found",
                    _ => "timeout",
                };
                if let Err(e) = other.into_result() {
                    self.fail(&job.id, JobState::Processing, e.to_string(), reason, &logger)
                        .await;
                }
            }
        }
    }

    async fn complete(&self, job_id: &JobId, payload: AnalysisPayload, logger: &JobLogger) {
        let job = match self
            .store
            .transition(job_id, JobState::Processing, &JobUpdate::Completed)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                logger.log_error(&format!("failed to record COMPLETED: {}", e));
                return;
            }
        };

        let completed_at = job.completed_at.unwrap_or(job.updated_at);
        self.cache
            .put_at(job.id.clone(), payload.clone(), completed_at)
            .await;
        metrics::record_job_completed();
        logger.log_completion("result cached");

        self.save_breakdown(&job, &payload, logger).await;
        self.publish(&AnalysisEvent::completed(&job), logger).await;
    }

    /// Secondary projection of the payload. Failure is logged and counted,
    /// the job stays `COMPLETED`.
    async fn save_breakdown(&self, job: &AnalysisJob, payload: &AnalysisPayload, logger: &JobLogger) {
        let breakdown = AnalysisBreakdown::from_payload(&job.subject_id, job.id.clone(), payload);
        if breakdown.is_empty() {
            return;
        }

        let result = retry_async(&self.persistence_retry, || {
            self.records.save_breakdown(&breakdown)
        })
        .await;

        if let RetryResult::Failed { error, attempts } = result {
            metrics::record_persistence_failure();
            let err = PipelineError::persistence(format!("{} (after {} attempts)", error, attempts));
            logger.log_warning(&err.to_string());
        }
    }

    async fn fail(
        &self,
        job_id: &JobId,
        expected: JobState,
        detail: String,
        reason: &str,
        logger: &JobLogger,
    ) {
        let job = match self
            .store
            .transition(job_id, expected, &JobUpdate::failed(detail))
            .await
        {
            Ok(job) => job,
            Err(e) => {
                logger.log_error(&format!("failed to record FAILED: {}", e));
                return;
            }
        };

        metrics::record_job_failed(reason);
        self.publish(&AnalysisEvent::failed(&job), logger).await;
    }

    async fn publish(&self, event: &AnalysisEvent, logger: &JobLogger) {
        if let Err(e) = self.notifier.publish(event).await {
            logger.log_warning(&format!("notification not delivered: {}", e));
        }
    }
}
