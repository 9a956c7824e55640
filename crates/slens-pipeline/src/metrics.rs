//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "slens_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "slens_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "slens_jobs_failed_total";
    pub const CHUNKS_SENT_TOTAL: &str = "slens_chunks_sent_total";
    pub const CHUNK_BYTES: &str = "slens_chunk_bytes";
    pub const POLL_ATTEMPTS_TOTAL: &str = "slens_poll_attempts_total";
    pub const CACHE_LOOKUPS_TOTAL: &str = "slens_result_cache_lookups_total";
    pub const CACHE_EVICTIONS_TOTAL: &str = "slens_result_cache_evictions_total";
    pub const PERSISTENCE_FAILURES_TOTAL: &str = "slens_secondary_persistence_failures_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// `reason` is a short label: "transfer", "remote_error", "not_found", "timeout".
pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_chunk_sent(bytes: u64) {
    counter!(names::CHUNKS_SENT_TOTAL).increment(1);
    histogram!(names::CHUNK_BYTES).record(bytes as f64);
}

/// `outcome`: "processing", "completed", "error", "not_found", "transport_error".
pub fn record_poll_attempt(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::POLL_ATTEMPTS_TOTAL, &labels).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let labels = [("result", if hit { "hit" } else { "miss" }.to_string())];
    counter!(names::CACHE_LOOKUPS_TOTAL, &labels).increment(1);
}

pub fn record_cache_evictions(count: usize) {
    if count > 0 {
        counter!(names::CACHE_EVICTIONS_TOTAL).increment(count as u64);
    }
}

pub fn record_persistence_failure() {
    counter!(names::PERSISTENCE_FAILURES_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_SUBMITTED_TOTAL.starts_with("slens_"));
        assert!(names::POLL_ATTEMPTS_TOTAL.contains("poll"));
        assert!(names::CACHE_EVICTIONS_TOTAL.contains("evictions"));
    }
}
