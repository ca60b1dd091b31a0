//! NDC gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Agent request
//!     ──────────────▶ request id ─▶ trace ─▶ security ─▶ body limit ─▶ request guard
//!                                                                        │
//!                                  ┌─────────────────────────────────────┤
//!                                  │ exempt (/health, /ready, /metrics)  │ deadline armed
//!                                  ▼                                     ▼
//!                              probe handlers                 /api/* → NDC upstream
//!
//!     Deadline fires first → 504 {"error":"request_timeout", ...}
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ndc_gateway::config::{self, GatewayConfig};
use ndc_gateway::observability::{logging, metrics};
use ndc_gateway::{GatewayServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "ndc-gateway")]
#[command(about = "NDC booking gateway with per-request deadlines", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("ndc-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        guard_timeout_ms = config.guard.timeout_ms,
        exempt_paths = ?config.guard.exempt_paths,
        upstream = ?config.upstream.base_url,
        "Configuration loaded"
    );

    let mut builder = GatewayServer::builder(config.clone());
    if config.observability.metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => builder = builder.metrics(handle),
            Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
        }
    }
    let server = builder.build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move { shutdown.trigger_on_signal().await });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
