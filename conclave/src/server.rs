use std::sync::Arc;

use conclave_api::{create_router, AppState, Config};
use conclave_sfu::SfuManager;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Signaling server with its background tasks
pub struct ConclaveServer {
    config: Arc<Config>,
    sfu: Arc<SfuManager>,
    maintenance: Option<JoinHandle<()>>,
}

impl ConclaveServer {
    #[must_use]
    pub fn new(config: Arc<Config>, sfu: Arc<SfuManager>) -> Self {
        Self {
            config,
            sfu,
            maintenance: None,
        }
    }

    /// Serve HTTP and WebSocket traffic until a shutdown signal arrives
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("Starting Conclave server...");
        self.maintenance = self.sfu.spawn_maintenance();

        let address = self.config.http_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener on {address}: {e}"))?;
        info!("HTTP server listening on {}", address);

        let router = create_router(AppState::new(Arc::clone(&self.sfu), Arc::clone(&self.config)));
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.shutdown();
        served.map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))
    }

    fn shutdown(&mut self) {
        info!("Shutting down Conclave server...");
        if let Some(task) = self.maintenance.take() {
            task.abort();
        }
        self.sfu.shutdown();
        info!("Conclave server shut down");
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C, starting graceful shutdown"); }
        () = terminate => { info!("Received SIGTERM, starting graceful shutdown"); }
    }
}
