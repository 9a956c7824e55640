//! Client for the remote analysis worker.
//!
//! The worker performs the actual speech/video feature extraction. This
//! crate only knows its HTTP surface:
//! - `POST /analysis` multipart chunk upload, optionally answering a `job_id`
//! - `GET /result/{job_id}` status polling
//! - `GET /health` liveness
//!
//! The pipeline depends on the [`ChunkUploader`] and [`StatusSource`] traits
//! rather than on [`AnalysisClient`] directly.

pub mod client;
pub mod error;
pub mod metrics;
pub mod transport;
pub mod types;

pub use client::{AnalysisClient, AnalysisClientConfig};
pub use error::{ClientError, ClientResult};
pub use transport::{ChunkUploader, StatusSource};
pub use types::{ChunkMetadata, ChunkUpload, RemoteStatus, StatusResponse, UploadResponse};
