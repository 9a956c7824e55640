//! Pipeline error types.

use slens_analysis_client::ClientError;
use slens_store::StoreError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Chunk transfer failures.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error during chunk transfer: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media file is empty: {0}")]
    EmptyFile(String),

    #[error("Chunk {chunk_index} of {total_chunks} failed: {source}")]
    Transport {
        chunk_index: u32,
        total_chunks: u32,
        /// An earlier chunk already returned the remote id
        id_received: bool,
        #[source]
        source: ClientError,
    },

    #[error("protocol violation: no id returned after {total_chunks} chunks")]
    NoCorrelationId { total_chunks: u32 },
}

impl TransferError {
    /// The remote worker could not be reached before it issued an id; it may
    /// still be starting up. Losing the connection after the id arrived is a
    /// plain transfer failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransferError::Transport { source, id_received: false, .. } if source.is_connectivity()
        )
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, TransferError::NoCorrelationId { .. })
    }
}

/// Terminal polling failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("analysis did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("remote analysis failed: {0}")]
    RemoteFailure(String),

    #[error("remote job unknown")]
    RemoteJobUnknown,

    #[error("polling cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Polling failed: {0}")]
    Poll(#[from] PollError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Analysis client error: {0}")]
    Client(#[from] ClientError),

    #[error("Secondary persistence failed: {0}")]
    Persistence(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Pipeline is shutting down")]
    ShuttingDown,
}

impl PipelineError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}
