mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use conclave_api::{init_logging, load_config};
use conclave_sfu::{LoopbackEngine, SfuManager};

use server::ConclaveServer;

#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Conclave SFU signaling server", long_about = None)]
struct Args {
    /// Path to a YAML or TOML config file
    #[arg(short, long, env = "CONCLAVE_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = Arc::new(load_config(args.config.as_deref())?);

    // 2. Initialize logging
    init_logging(&config.logging)?;
    info!("Configuration loaded and validated successfully");
    info!("Conclave server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Media engine
    let engine = Arc::new(LoopbackEngine::new(config.media.loopback_options()));
    info!(
        announced_ip = %config.media.announced_ip,
        rtc_min_port = config.media.rtc_min_port,
        rtc_max_port = config.media.rtc_max_port,
        "Loopback media engine initialized"
    );

    // 4. Coordination core
    let sfu = SfuManager::new(config.sfu.clone(), engine);

    ConclaveServer::new(config, sfu).start().await
}
