//! Application server process of the web bridge.
//!
//! Hosts a small demonstration application: every page echoes the request
//! path and counts visits per session. `/Logout` abandons the session and
//! `/Home` redirects to `/Index`.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use web_bridge::backend::{AppHost, AppServer, Application};
use web_bridge::config::load_or_default;
use web_bridge::config::validation::check_application_path;
use web_bridge::lifecycle::{signals, Shutdown};
use web_bridge::observability::{logging, metrics};
use web_bridge::protocol::{Request, Response};
use web_bridge::transport::BridgeListener;

#[derive(Parser)]
#[command(name = "app-server")]
#[command(about = "Application server answering bridged requests", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Echoes the path and keeps a per-session visit counter.
struct EchoApp;

impl Application for EchoApp {
    fn handle(&self, request: &Request, host: &mut dyn AppHost) {
        match request.path.as_str() {
            "/Home" => host.render(Response::text(200, "text/html", "").with_header("Location", "/Index")),
            "/Logout" => {
                let mut response = Response::text(200, "text/html", "Signed out");
                response.abandon_session = true;
                host.render(response);
            }
            path => {
                let visits = host.get_session("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                host.set_session("visits", json!(visits));

                let total = host.get_application("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                host.set_application("visits", json!(total));

                host.render(
                    Response::text(200, "text/html", path)
                        .with_header("X-Session-Visits", visits.to_string())
                        .with_header("X-Total-Visits", total.to_string()),
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("app-server v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = check_application_path(&config.backend) {
        tracing::error!(error = %e, "Application path is not usable");
        return Err(e.to_string().into());
    }

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    // Nothing can be served without the fixed address, so a bind failure is fatal.
    let listener = match BridgeListener::bind(&config.backend.address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind application address");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = AppServer::new(config.backend, EchoApp);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
