//! Health check endpoints
//!
//! Provides simple health check for monitoring probes.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/stats", get(stats))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Live counters of rooms, endpoints and media objects
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sfu.stats())
}
