//! Durable per-subject analysis records.
//!
//! A projection of the cached payload kept alongside the subject
//! (presentation/video). Writes are best-effort from the pipeline's point
//! of view; the result cache stays authoritative.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use slens_models::AnalysisBreakdown;
use tokio::sync::RwLock;

use crate::error::StoreResult;

#[async_trait]
pub trait SubjectRecordStore: Send + Sync {
    /// Replace the subject's analysis record.
    async fn save_breakdown(&self, breakdown: &AnalysisBreakdown) -> StoreResult<()>;

    async fn get_breakdown(&self, subject_id: &str) -> StoreResult<Option<AnalysisBreakdown>>;
}

/// Subject records kept in process memory.
#[derive(Default)]
pub struct InMemorySubjectRecords {
    records: RwLock<HashMap<String, AnalysisBreakdown>>,
}

impl InMemorySubjectRecords {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubjectRecordStore for InMemorySubjectRecords {
    async fn save_breakdown(&self, breakdown: &AnalysisBreakdown) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(breakdown.subject_id.clone(), breakdown.clone());
        Ok(())
    }

    async fn get_breakdown(&self, subject_id: &str) -> StoreResult<Option<AnalysisBreakdown>> {
        Ok(self.records.read().await.get(subject_id).cloned())
    }
}

/// Subject records stored as JSON under `{prefix}:subject:{subject_id}:analysis`.
pub struct RedisSubjectRecords {
    client: redis::Client,
    prefix: String,
}

impl RedisSubjectRecords {
    pub fn new(client: redis::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, subject_id: &str) -> String {
        format!("{}:subject:{}:analysis", self.prefix, subject_id)
    }
}

#[async_trait]
impl SubjectRecordStore for RedisSubjectRecords {
    async fn save_breakdown(&self, breakdown: &AnalysisBreakdown) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(breakdown)?;
        let _: () = conn.set(self.key(&breakdown.subject_id), payload).await?;
        Ok(())
    }

    async fn get_breakdown(&self, subject_id: &str) -> StoreResult<Option<AnalysisBreakdown>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.key(subject_id)).await?;
        Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
    }
}
