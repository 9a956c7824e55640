//! Asynchronous media-analysis job pipeline.
//!
//! This crate provides:
//! - Chunked transfer of large media files to the remote analysis worker
//! - Bounded status polling with transient-fault tolerance and cancellation
//! - A TTL result cache that serves completed analyses
//! - The job orchestrator driving the `PENDING → PROCESSING → COMPLETED|FAILED`
//!   state machine and publishing completion/failure events

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod poller;
pub mod result_cache;
pub mod retry;
pub mod transfer;

pub use config::{PipelineConfig, CHUNK_SIZE};
pub use error::{PipelineError, PipelineResult, PollError, TransferError};
pub use logging::JobLogger;
pub use notify::{
    BroadcastNotificationSink, LogNotificationSink, NotificationSink, RedisNotificationSink,
};
pub use orchestrator::{JobOrchestrator, SubmitRequest};
pub use poller::{PollOutcome, StatusPoller};
pub use result_cache::ResultCache;
pub use transfer::{chunk_count, ChunkTransfer, TransferReceipt};
