//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slens_models::{AnalysisJob, JobId, JobState, JobUpdate};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::job_store::AnalysisJobStore;

/// Job store backed by a `RwLock<HashMap>`.
///
/// Records are replaced whole under the write lock, so a status read never
/// observes a half-applied transition.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, AnalysisJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisJobStore for InMemoryJobStore {
    async fn create(&self, job: &AnalysisJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<AnalysisJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        update: &JobUpdate,
    ) -> StoreResult<AnalysisJob> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get(id).ok_or_else(|| StoreError::not_found(id.as_str()))?;

        if current.state != expected {
            return Err(StoreError::StaleState {
                job_id: id.to_string(),
                expected,
                actual: current.state,
            });
        }

        let mut next = current.clone();
        next.apply(update)?;
        jobs.insert(id.clone(), next.clone());

        debug!(job_id = %id, from = %expected, to = %next.state, "Job transitioned");
        Ok(next)
    }

    async fn stuck_jobs(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>> {
        let jobs = self.jobs.read().await;
        let mut stuck: Vec<_> = jobs.values().filter(|j| j.is_stuck(cutoff)).cloned().collect();
        stuck.sort_by_key(|j| j.created_at);
        Ok(stuck)
    }

    async fn terminal_jobs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>> {
        let jobs = self.jobs.read().await;
        let mut done: Vec<_> = jobs
            .values()
            .filter(|j| j.is_purgeable(cutoff))
            .cloned()
            .collect();
        done.sort_by_key(|j| j.created_at);
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn job() -> AnalysisJob {
        AnalysisJob::new("subject-1", "Investor pitch", "owner-1")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();

        assert_eq!(store.get(&job.id).await.unwrap(), Some(job.clone()));
        assert!(matches!(
            store.create(&job).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(store.get(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_requires_expected_state() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();

        let err = store
            .transition(&job.id, JobState::Processing, &JobUpdate::Completed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleState {
                actual: JobState::Pending,
                ..
            }
        ));

        let updated = store
            .transition(&job.id, JobState::Pending, &JobUpdate::processing("r-1"))
            .await
            .unwrap();
        assert_eq!(updated.state, JobState::Processing);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();
        store
            .transition(&job.id, JobState::Pending, &JobUpdate::processing("r-1"))
            .await
            .unwrap();
        store
            .transition(&job.id, JobState::Processing, &JobUpdate::Completed)
            .await
            .unwrap();

        for update in [
            JobUpdate::failed("late failure"),
            JobUpdate::Completed,
            JobUpdate::processing("r-2"),
        ] {
            let err = store
                .transition(&job.id, JobState::Completed, &update)
                .await
                .unwrap_err();
            assert!(err.is_rejected_transition());
        }

        let stored = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert!(stored.error_detail.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job_transition() {
        let store = InMemoryJobStore::new();
        let err = store
            .transition(&JobId::new(), JobState::Pending, &JobUpdate::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_only_one_wins() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = job();
        store.create(&job).await.unwrap();
        store
            .transition(&job.id, JobState::Pending, &JobUpdate::processing("r-1"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let id = job.id.clone();
            handles.push(tokio::spawn(async move {
                let update = if i % 2 == 0 {
                    JobUpdate::Completed
                } else {
                    JobUpdate::failed("poll timeout")
                };
                store.transition(&id, JobState::Processing, &update).await.is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_stuck_and_terminal_queries() {
        let store = InMemoryJobStore::new();
        let old = Utc::now() - chrono::Duration::hours(3);
        let cutoff = Utc::now() - chrono::Duration::hours(1);

        let mut stuck = job();
        stuck.created_at = old;
        store.create(&stuck).await.unwrap();
        store
            .transition(&stuck.id, JobState::Pending, &JobUpdate::processing("r-1"))
            .await
            .unwrap();

        let fresh = job();
        store.create(&fresh).await.unwrap();
        store
            .transition(&fresh.id, JobState::Pending, &JobUpdate::processing("r-2"))
            .await
            .unwrap();

        let mut finished = job();
        finished.created_at = old;
        store.create(&finished).await.unwrap();
        store
            .transition(&finished.id, JobState::Pending, &JobUpdate::failed("boom"))
            .await
            .unwrap();

        let stuck_jobs = store.stuck_jobs(cutoff).await.unwrap();
        assert_eq!(stuck_jobs.len(), 1);
        assert_eq!(stuck_jobs[0].id, stuck.id);

        let purgeable = store.terminal_jobs_before(cutoff).await.unwrap();
        assert_eq!(purgeable.len(), 1);
        assert_eq!(purgeable[0].id, finished.id);
    }
}
