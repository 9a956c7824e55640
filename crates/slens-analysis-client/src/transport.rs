//! Seams between the pipeline and the remote worker.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{ChunkUpload, RemoteStatus, UploadResponse};

/// Sends one chunk of a media file.
#[async_trait]
pub trait ChunkUploader: Send + Sync {
    async fn upload_chunk(&self, chunk: &ChunkUpload) -> ClientResult<UploadResponse>;
}

/// Reports the status of a remote job.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, correlation_id: &str) -> ClientResult<RemoteStatus>;
}
