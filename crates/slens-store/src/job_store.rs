//! Analysis job store contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slens_models::{AnalysisJob, JobId, JobState, JobUpdate};
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreResult;
use crate::memory::InMemoryJobStore;
use crate::redis_store::RedisJobStore;
use crate::subject_records::{InMemorySubjectRecords, RedisSubjectRecords, SubjectRecordStore};

/// Durable record of analysis jobs.
///
/// Every transition is a compare-and-set against the expected predecessor
/// state: concurrent readers see either the old or the new record, never a
/// mix of both.
#[async_trait]
pub trait AnalysisJobStore: Send + Sync {
    /// Insert a new job. Fails with `AlreadyExists` on id collision.
    async fn create(&self, job: &AnalysisJob) -> StoreResult<()>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<AnalysisJob>>;

    /// Apply `update` if the job is currently in `expected`.
    ///
    /// Returns the updated record. Fails with `StaleState` when the job
    /// moved on, `InvalidTransition` when the edge is not allowed and
    /// `NotFound` for unknown ids.
    async fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        update: &JobUpdate,
    ) -> StoreResult<AnalysisJob>;

    /// Jobs still `PROCESSING` that were created before `cutoff`.
    async fn stuck_jobs(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>>;

    /// `COMPLETED`/`FAILED` jobs created before `cutoff`.
    async fn terminal_jobs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>>;
}

/// Build the job store and subject record store for a configuration.
pub async fn build_stores(
    config: &StoreConfig,
) -> StoreResult<(Arc<dyn AnalysisJobStore>, Arc<dyn SubjectRecordStore>)> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory job store");
            Ok((
                Arc::new(InMemoryJobStore::new()),
                Arc::new(InMemorySubjectRecords::new()),
            ))
        }
        StoreBackend::Redis => {
            info!("Using Redis job store at {}", config.redis_url);
            let client = redis::Client::open(config.redis_url.as_str())?;
            Ok((
                Arc::new(RedisJobStore::new(client.clone(), &config.key_prefix)),
                Arc::new(RedisSubjectRecords::new(client, &config.key_prefix)),
            ))
        }
    }
}
