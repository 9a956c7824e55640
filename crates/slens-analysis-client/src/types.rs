//! Analysis service request/response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slens_models::{AnalysisPayload, TargetTime};

/// Caller-supplied metadata sent with every chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Target presentation duration (`mm:ss`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_time: Option<TargetTime>,
}

/// One chunk ready to be sent, already written to a temporary part file.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    /// Temporary file holding exactly this chunk's bytes
    pub part_path: PathBuf,
    /// Size of the part in bytes
    pub len: u64,
    /// 0-based chunk index
    pub chunk_index: u32,
    /// Total number of chunks for the file
    pub total_chunks: u32,
    /// Source filename without extension
    pub original_filename: String,
    pub metadata: ChunkMetadata,
}

/// Response to a chunk upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl UploadResponse {
    pub fn with_job_id(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
        }
    }

    /// Correlation id, ignoring blank values.
    pub fn correlation_id(&self) -> Option<&str> {
        self.job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Status value reported by `GET /result/{job_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatusKind {
    Processing,
    Completed,
    Error,
    NotFound,
}

/// Raw status response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Interpreted remote status.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    Processing,
    Completed(AnalysisPayload),
    Error(String),
    NotFound,
}

impl From<StatusResponse> for RemoteStatus {
    fn from(response: StatusResponse) -> Self {
        match response.status {
            RemoteStatusKind::Processing => RemoteStatus::Processing,
            // A completed job without a result body still completed.
            RemoteStatusKind::Completed => {
                RemoteStatus::Completed(response.result.unwrap_or_default())
            }
            RemoteStatusKind::Error => RemoteStatus::Error(
                response
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            RemoteStatusKind::NotFound => RemoteStatus::NotFound,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
