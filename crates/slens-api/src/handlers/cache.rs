//! Result cache administration.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheSizeResponse {
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheEvictionResponse {
    pub removed: usize,
    pub size: usize,
}

/// `GET /api/cache/size`
pub async fn get_cache_size(State(state): State<AppState>) -> Json<CacheSizeResponse> {
    Json(CacheSizeResponse {
        size: state.orchestrator.cache_size().await,
    })
}

/// `DELETE /api/cache`
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheEvictionResponse> {
    let removed = state.orchestrator.clear_cache().await;
    info!(removed, "Result cache cleared");
    Json(CacheEvictionResponse {
        removed,
        size: state.orchestrator.cache_size().await,
    })
}

/// `POST /api/cache/sweep`
pub async fn sweep_cache(State(state): State<AppState>) -> Json<CacheEvictionResponse> {
    let removed = state.orchestrator.sweep_cache().await;
    Json(CacheEvictionResponse {
        removed,
        size: state.orchestrator.cache_size().await,
    })
}
