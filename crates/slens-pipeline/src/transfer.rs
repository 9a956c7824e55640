//! Chunked media transfer.
//!
//! Splits a local media file into fixed-size parts and sends them to the
//! remote worker in order, one request per part. Every part goes through a
//! scoped temporary directory that is removed on success, failure and
//! cancellation alike.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slens_analysis_client::{ChunkMetadata, ChunkUpload, ChunkUploader};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::TransferError;
use crate::metrics;

/// Number of chunks needed for `file_size` bytes (ceiling division).
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u32 {
    let chunk_size = chunk_size.max(1);
    let count = file_size.div_ceil(chunk_size);
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Id the remote worker assigned to the analysis
    pub correlation_id: String,
    pub total_chunks: u32,
    pub bytes_sent: u64,
}

/// Sends media files to the remote worker in chunks.
#[derive(Clone)]
pub struct ChunkTransfer {
    uploader: Arc<dyn ChunkUploader>,
    chunk_size: u64,
    work_dir: PathBuf,
}

impl ChunkTransfer {
    pub fn new(uploader: Arc<dyn ChunkUploader>, chunk_size: u64, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploader,
            chunk_size: chunk_size.max(1),
            work_dir: work_dir.into(),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Send `media_path` and return the correlation id.
    ///
    /// Chunks go out strictly in index order. The first non-blank id in any
    /// response wins; later ids are ignored. A transfer that finishes
    /// without any id is a protocol violation.
    pub async fn send(
        &self,
        media_path: &Path,
        metadata: &ChunkMetadata,
    ) -> Result<TransferReceipt, TransferError> {
        let file_size = tokio::fs::metadata(media_path).await?.len();
        if file_size == 0 {
            return Err(TransferError::EmptyFile(media_path.display().to_string()));
        }

        let total_chunks = chunk_count(file_size, self.chunk_size);
        let original_filename = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("slens-chunks-")
            .tempdir_in(&self.work_dir)?;

        info!(
            file = %media_path.display(),
            file_size,
            total_chunks,
            "Starting chunked transfer"
        );

        let mut source = File::open(media_path).await?;
        let mut correlation_id: Option<String> = None;
        let mut bytes_sent = 0u64;

        for chunk_index in 0..total_chunks {
            let part_path = scratch.path().join(format!("part-{:05}", chunk_index));
            let len = write_part(&mut source, &part_path, self.chunk_size).await?;

            let upload = ChunkUpload {
                part_path: part_path.clone(),
                len,
                chunk_index,
                total_chunks,
                original_filename: original_filename.clone(),
                metadata: metadata.clone(),
            };

            let response = self.uploader.upload_chunk(&upload).await;

            if let Err(e) = tokio::fs::remove_file(&part_path).await {
                debug!(part = %part_path.display(), "Failed to remove chunk part: {}", e);
            }

            let response = response.map_err(|source| TransferError::Transport {
                chunk_index,
                total_chunks,
                id_received: correlation_id.is_some(),
                source,
            })?;

            bytes_sent += len;
            metrics::record_chunk_sent(len);
            debug!(chunk_index, total_chunks, len, "Chunk sent");

            if correlation_id.is_none() {
                if let Some(id) = response.correlation_id() {
                    correlation_id = Some(id.to_string());
                }
            }
        }

        let correlation_id =
            correlation_id.ok_or(TransferError::NoCorrelationId { total_chunks })?;

        info!(%correlation_id, total_chunks, bytes_sent, "Chunked transfer finished");

        Ok(TransferReceipt {
            correlation_id,
            total_chunks,
            bytes_sent,
        })
    }
}

/// Copy up to `limit` bytes from the current position of `source` into a
/// new file at `path`.
async fn write_part(source: &mut File, path: &Path, limit: u64) -> io::Result<u64> {
    let mut part = File::create(path).await?;
    let mut reader = (&mut *source).take(limit);
    let written = tokio::io::copy(&mut reader, &mut part).await?;
    part.flush().await?;

    if written == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "media file shrank during transfer",
        ));
    }
    Ok(written)
}
