//! Application state and pipeline wiring.

use std::sync::Arc;

use slens_analysis_client::AnalysisClient;
use slens_pipeline::{
    JobOrchestrator, LogNotificationSink, NotificationSink, PipelineConfig, RedisNotificationSink,
};
use slens_store::{build_stores, StoreConfig};
use tracing::info;

use crate::config::{ApiConfig, NotifyBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: JobOrchestrator,
    /// Used by the readiness probe
    pub analysis: Arc<AnalysisClient>,
}

impl AppState {
    /// Wire the pipeline from environment configuration.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let analysis = Arc::new(AnalysisClient::from_env()?);
        info!("Analysis service at {}", analysis.base_url());

        let store_config = StoreConfig::from_env();
        let (store, records) = build_stores(&store_config).await?;

        let notifier: Arc<dyn NotificationSink> = match config.notify_backend {
            NotifyBackend::Log => Arc::new(LogNotificationSink),
            NotifyBackend::Redis => {
                info!("Publishing analysis events to Redis");
                Arc::new(RedisNotificationSink::new(&store_config.redis_url)?)
            }
        };

        let pipeline_config = PipelineConfig::from_env();
        info!(
            chunk_size = pipeline_config.chunk_size,
            poll_interval_secs = pipeline_config.poll_interval.as_secs(),
            max_poll_attempts = pipeline_config.max_poll_attempts,
            max_concurrent_jobs = pipeline_config.max_concurrent_jobs,
            "Pipeline configured"
        );

        let orchestrator = JobOrchestrator::new(
            &pipeline_config,
            store,
            records,
            analysis.clone(),
            analysis.clone(),
            notifier,
        );

        Ok(Self {
            config,
            orchestrator,
            analysis,
        })
    }

    /// State from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        orchestrator: JobOrchestrator,
        analysis: Arc<AnalysisClient>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            analysis,
        }
    }
}
