//! Cached analysis results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Days a completed result stays servable.
pub const RESULT_TTL_DAYS: i64 = 7;

/// Opaque structured result produced by the remote worker
/// (named metrics and values).
pub type AnalysisPayload = serde_json::Map<String, serde_json::Value>;

/// A result entry held by the result cache.
///
/// Created once at job completion and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub job_id: JobId,
    pub payload: AnalysisPayload,
    pub completed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedResult {
    /// Build an entry expiring `ttl` after `completed_at`.
    pub fn new(
        job_id: JobId,
        payload: AnalysisPayload,
        completed_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            job_id,
            payload,
            completed_at,
            expires_at: completed_at + ttl,
        }
    }

    /// Build an entry with the default seven-day TTL.
    pub fn with_default_ttl(
        job_id: JobId,
        payload: AnalysisPayload,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self::new(job_id, payload, completed_at, Duration::days(RESULT_TTL_DAYS))
    }

    /// Expired entries must not be served.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
