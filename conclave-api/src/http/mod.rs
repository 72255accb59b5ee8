//! HTTP routes and shared handler state

mod error;
mod health;
mod rooms;
mod websocket;

use axum::{routing::get, Router};
use conclave_sfu::SfuManager;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

pub use error::{AppError, AppResult};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sfu: Arc<SfuManager>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(sfu: Arc<SfuManager>, config: Arc<Config>) -> Self {
        Self { sfu, config }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .merge(health::create_health_router())
        .merge(rooms::create_rooms_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
