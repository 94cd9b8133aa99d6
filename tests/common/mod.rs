//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use web_bridge::backend::{AppServer, Application};
use web_bridge::config::{BackendConfig, BridgeConfig};
use web_bridge::http::FrontendServer;
use web_bridge::lifecycle::Shutdown;
use web_bridge::transport::BridgeListener;

/// Start an application server on an ephemeral port.
pub async fn start_app<A>(application: A, shutdown: &Shutdown) -> SocketAddr
where
    A: Application + 'static,
{
    let listener = BridgeListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = AppServer::new(BackendConfig::default(), application);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    addr
}

/// Start a fake backend that answers every exchange with `reply`, verbatim.
#[allow(dead_code)]
pub async fn start_raw_backend(reply: &'static str) -> SocketAddr {
    let mut listener = BridgeListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok(exchange) = listener.receive().await {
            let _ = exchange.reply(reply).await;
        }
    });

    addr
}

/// Start a fake backend that accepts connections and never replies.
#[allow(dead_code)]
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start the HTTP front end bridging to `backend`.
pub async fn start_frontend(mut config: BridgeConfig, backend: SocketAddr, shutdown: &Shutdown) -> SocketAddr {
    config.backend.address = backend.to_string();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = FrontendServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

/// HTTP client that does not follow redirects or reuse connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
