//! Analysis client metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Requests to the analysis service by operation and status.
    pub const REQUESTS_TOTAL: &str = "slens_analysis_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "slens_analysis_latency_seconds";
}

/// Record metrics for a completed request. `status` is 0 for transport failures.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}
