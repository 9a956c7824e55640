//! Completion/failure notifications.
//!
//! The orchestrator publishes exactly one [`AnalysisEvent`] per job that
//! reaches a terminal state. Delivery failures are logged by the caller and
//! never affect the job.

use async_trait::async_trait;
use redis::AsyncCommands;
use slens_models::AnalysisEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &AnalysisEvent) -> PipelineResult<()>;
}

/// Writes events to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn publish(&self, event: &AnalysisEvent) -> PipelineResult<()> {
        info!(
            job_id = %event.job_id,
            owner_id = %event.owner_id,
            subject_id = %event.subject_id,
            success = event.success,
            "Analysis for \"{}\" finished", event.subject_title
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<AnalysisEvent>,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotificationSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn publish(&self, event: &AnalysisEvent) -> PipelineResult<()> {
        // No subscribers is not an error.
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        debug!(job_id = %event.job_id, receivers, "Broadcast analysis event");
        Ok(())
    }
}

/// Publishes events as JSON on a Redis pub/sub channel.
pub struct RedisNotificationSink {
    client: redis::Client,
    channel: String,
}

impl RedisNotificationSink {
    pub const DEFAULT_CHANNEL: &'static str = "analysis:events";

    pub fn new(redis_url: &str) -> PipelineResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| PipelineError::notification(e.to_string()))?;
        Ok(Self {
            client,
            channel: Self::DEFAULT_CHANNEL.to_string(),
        })
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl NotificationSink for RedisNotificationSink {
    async fn publish(&self, event: &AnalysisEvent) -> PipelineResult<()> {
        let payload =
            serde_json::to_string(event).map_err(|e| PipelineError::notification(e.to_string()))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PipelineError::notification(e.to_string()))?;

        debug!("Publishing analysis event to {}", self.channel);
        conn.publish::<_, _, ()>(&self.channel, payload)
            .await
            .map_err(|e| PipelineError::notification(e.to_string()))?;

        Ok(())
    }
}
