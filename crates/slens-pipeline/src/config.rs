//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Size of one transferred chunk (50 MiB).
pub const CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bytes per transferred chunk
    pub chunk_size: u64,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Status polls before giving up (240 x 5s = 20 minutes)
    pub max_poll_attempts: u32,
    /// How long completed results stay servable
    pub result_ttl: Duration,
    /// Parent directory for temporary chunk parts
    pub work_dir: PathBuf,
    /// Maximum jobs transferring/polling at once
    pub max_concurrent_jobs: usize,
    /// Sweep expired cache entries every N writes
    pub cache_sweep_every: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 240,
            result_ttl: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            work_dir: std::env::temp_dir().join("slens"),
            max_concurrent_jobs: 4,
            cache_sweep_every: 64,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: std::env::var("PIPELINE_CHUNK_SIZE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &u64| n > 0)
                .unwrap_or(defaults.chunk_size),
            poll_interval: Duration::from_secs(
                std::env::var("PIPELINE_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_poll_attempts: std::env::var("PIPELINE_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(240),
            result_ttl: Duration::from_secs(
                std::env::var("PIPELINE_RESULT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7 * 24 * 60 * 60),
            ),
            work_dir: std::env::var("PIPELINE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: std::env::var("PIPELINE_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(4),
            cache_sweep_every: std::env::var("PIPELINE_CACHE_SWEEP_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &u64| n > 0)
                .unwrap_or(64),
        }
    }

    /// Upper bound on time spent polling one job.
    pub fn poll_ceiling(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 52_428_800);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_poll_attempts, 240);
        assert_eq!(config.poll_ceiling(), Duration::from_secs(20 * 60));
        assert_eq!(config.result_ttl, Duration::from_secs(604_800));
    }
}
