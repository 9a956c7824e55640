//! TTL cache of completed analysis results.
//!
//! Entries expire a fixed TTL after completion. Expired entries are never
//! served: a lookup that finds one evicts it and reports a miss. A full
//! sweep also runs every `sweep_every` writes so abandoned entries do not
//! accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use slens_models::{AnalysisPayload, CachedResult, JobId, RESULT_TTL_DAYS};
use tokio::sync::RwLock;
use tracing::debug;

use crate::metrics;

pub struct ResultCache {
    entries: RwLock<HashMap<JobId, CachedResult>>,
    ttl: Duration,
    writes: AtomicU64,
    sweep_every: u64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Duration::days(RESULT_TTL_DAYS), 64)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration, sweep_every: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            writes: AtomicU64::new(0),
            sweep_every: sweep_every.max(1),
        }
    }

    /// Build from a `std::time::Duration` TTL, falling back to the default
    /// TTL when it does not fit.
    pub fn with_std_ttl(ttl: std::time::Duration, sweep_every: u64) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(RESULT_TTL_DAYS));
        Self::new(ttl, sweep_every)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store the result of a job completed now.
    pub async fn put(&self, job_id: JobId, payload: AnalysisPayload) -> CachedResult {
        self.put_at(job_id, payload, Utc::now()).await
    }

    /// Store a result completed at `completed_at`, replacing any previous
    /// entry for the job.
    pub async fn put_at(
        &self,
        job_id: JobId,
        payload: AnalysisPayload,
        completed_at: DateTime<Utc>,
    ) -> CachedResult {
        let entry = CachedResult::new(job_id.clone(), payload, completed_at, self.ttl);
        self.entries.write().await.insert(job_id, entry.clone());

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.sweep_every == 0 {
            self.sweep_expired_at(completed_at).await;
        }

        entry
    }

    pub async fn get(&self, job_id: &JobId) -> Option<CachedResult> {
        self.get_at(job_id, Utc::now()).await
    }

    /// Look up a live entry as of `now`, evicting it if expired.
    pub async fn get_at(&self, job_id: &JobId, now: DateTime<Utc>) -> Option<CachedResult> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(job_id) {
                Some(entry) if !entry.is_expired_at(now) => {
                    metrics::record_cache_lookup(true);
                    return Some(entry.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().await;
            // Re-check: a fresh put may have landed between the locks.
            if let Some(entry) = entries.get(job_id) {
                if !entry.is_expired_at(now) {
                    metrics::record_cache_lookup(true);
                    return Some(entry.clone());
                }
                entries.remove(job_id);
                metrics::record_cache_evictions(1);
                debug!(job_id = %job_id, "Evicted expired result");
            }
        }

        metrics::record_cache_lookup(false);
        None
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();

        if removed > 0 {
            metrics::record_cache_evictions(removed);
            debug!(removed, "Swept expired results");
        }
        removed
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every entry. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}
