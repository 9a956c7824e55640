//! Redis-backed job store.
//!
//! Layout:
//! - `{prefix}:job:{job_id}` JSON-encoded [`AnalysisJob`]
//! - `{prefix}:jobs:by_created` sorted set of job ids scored by creation time (ms)
//!
//! Transitions are computed client-side and committed with a Lua
//! compare-and-set on the stored `state` field, so a record is only
//! replaced while it is still in the expected predecessor state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use slens_models::{AnalysisJob, JobId, JobState, JobUpdate};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::job_store::AnalysisJobStore;

const CREATE_SCRIPT: &str = r#"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
    return 1
end
return 0
"#;

const TRANSITION_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
if cjson.decode(current)['state'] ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2])
return 1
"#;

/// Job store persisted in Redis.
pub struct RedisJobStore {
    client: redis::Client,
    prefix: String,
}

impl RedisJobStore {
    pub fn new(client: redis::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    fn job_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn index_key(&self) -> String {
        format!("{}:jobs:by_created", self.prefix)
    }

    async fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let ids: Vec<String> = conn
            .zrangebyscore(
                self.index_key(),
                "-inf",
                format!("({}", cutoff.timestamp_millis()),
            )
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.job_key(id)).collect();
        let raw: Vec<Option<String>> = conn.mget(keys).await?;

        let mut jobs = Vec::with_capacity(raw.len());
        for value in raw.into_iter().flatten() {
            jobs.push(decode(&value)?);
        }
        Ok(jobs)
    }
}

fn decode(raw: &str) -> StoreResult<AnalysisJob> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl AnalysisJobStore for RedisJobStore {
    async fn create(&self, job: &AnalysisJob) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;

        let created: i32 = Script::new(CREATE_SCRIPT)
            .key(self.job_key(job.id.as_str()))
            .key(self.index_key())
            .arg(payload)
            .arg(job.created_at.timestamp_millis())
            .arg(job.id.as_str())
            .invoke_async(&mut conn)
            .await?;

        if created == 0 {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<AnalysisJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.job_key(id.as_str())).await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        update: &JobUpdate,
    ) -> StoreResult<AnalysisJob> {
        let mut current = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;

        if current.state != expected {
            return Err(StoreError::StaleState {
                job_id: id.to_string(),
                expected,
                actual: current.state,
            });
        }

        current.apply(update)?;
        let payload = serde_json::to_string(&current)?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let outcome: i32 = Script::new(TRANSITION_SCRIPT)
            .key(self.job_key(id.as_str()))
            .arg(expected.as_str())
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        match outcome {
            1 => {
                debug!(job_id = %id, from = %expected, to = %current.state, "Job transitioned");
                Ok(current)
            }
            -1 => Err(StoreError::not_found(id.as_str())),
            _ => {
                let actual = self
                    .get(id)
                    .await?
                    .map(|j| j.state)
                    .ok_or_else(|| StoreError::not_found(id.as_str()))?;
                Err(StoreError::StaleState {
                    job_id: id.to_string(),
                    expected,
                    actual,
                })
            }
        }
    }

    async fn stuck_jobs(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>> {
        let jobs = self.jobs_created_before(cutoff).await?;
        Ok(jobs.into_iter().filter(|j| j.is_stuck(cutoff)).collect())
    }

    async fn terminal_jobs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<AnalysisJob>> {
        let jobs = self.jobs_created_before(cutoff).await?;
        Ok(jobs.into_iter().filter(|j| j.is_purgeable(cutoff)).collect())
    }
}
