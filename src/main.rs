//! HTTP front end of the web bridge.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────── FRONT END (this binary) ────────────────┐
//!   Client Request     │  ┌─────────┐    ┌─────────┐    ┌──────────────┐         │
//!   ───────────────────┼─▶│  axum   │───▶│ capture │───▶│ BridgeClient │─────────┼──▶ app-server
//!                      │  │ router  │    │         │    │ (one call)   │         │    (serial loop,
//!   Client Response    │  └─────────┘    └─────────┘    └──────┬───────┘         │     stores,
//!   ◀──────────────────┼───────────────── render ◀─────────────┘                 │     application)
//!                      │                                                         │
//!                      │   config · logging · metrics · signals/shutdown         │
//!                      └─────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use web_bridge::config::load_or_default;
use web_bridge::http::FrontendServer;
use web_bridge::lifecycle::{signals, Shutdown};
use web_bridge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "web-bridge")]
#[command(about = "HTTP front end that bridges requests to an application server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("web-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.frontend.bind_address,
        backend = %config.backend.address,
        max_body_size = config.frontend.max_body_size,
        reply_timeout_secs = ?config.backend.reply_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let metrics_addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(metrics_addr);
    }

    let listener = TcpListener::bind(&config.frontend.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for HTTP requests");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = FrontendServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
