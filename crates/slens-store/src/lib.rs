//! Persistence for the analysis pipeline.
//!
//! This crate provides:
//! - [`AnalysisJobStore`]: job records with atomic, state-checked transitions
//! - [`SubjectRecordStore`]: durable per-subject analysis breakdowns
//! - In-memory backends (tests, single-node) and Redis backends

pub mod config;
pub mod error;
pub mod job_store;
pub mod memory;
pub mod redis_store;
pub mod subject_records;

pub use config::{StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use job_store::{build_stores, AnalysisJobStore};
pub use memory::InMemoryJobStore;
pub use redis_store::RedisJobStore;
pub use subject_records::{InMemorySubjectRecords, RedisSubjectRecords, SubjectRecordStore};
