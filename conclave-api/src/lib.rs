//! Conclave API layer
//!
//! Wire protocol, WebSocket gateway, HTTP routes, configuration and logging
//! setup for the signaling server.

pub mod config;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod protocol;

pub use config::{load_config, Config};
pub use gateway::MessageHandler;
pub use http::{create_router, AppError, AppResult, AppState};
pub use logging::init_logging;
