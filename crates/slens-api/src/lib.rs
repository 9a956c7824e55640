//! Axum HTTP API for the media-analysis pipeline.
//!
//! This crate provides:
//! - Job submission, status and result queries
//! - Cache administration and stuck/purgeable job queries
//! - Liveness/readiness probes and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, NotifyBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
