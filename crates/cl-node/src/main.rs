//! # Cipherlink Node
//!
//! Entry point launched by the host application.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (stderr)
//! 2. Load configuration (TOML file, then `CL_*` environment variables)
//! 3. Validate: TLS material and the shared secret are mandatory
//! 4. Bind the loopback listener and print `listening on <port>` to stdout
//! 5. Serve until Ctrl+C

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use cl_crypto::NativeEngine;
use cl_gateway::{CipherlinkService, StdoutSignal};
use cl_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("initializing logging")?;

    let config = config::load_config()?;
    info!(
        port = config.server.port,
        key_cache = ?config.key_cache.mode,
        "Starting Cipherlink node v{}",
        cl_gateway::VERSION
    );

    let service = CipherlinkService::new(
        config,
        Arc::new(NativeEngine::new()),
        Arc::new(StdoutSignal),
    )
    .context("invalid configuration")?;
    let handle = service.start().await.context("starting service")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;

    handle.shutdown().await;
    service.cache().flush();
    Ok(())
}
