//! HTTP front end setup and the bridging handler.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, body limit)
//! - Capture each request, exchange it with the backend, render the reply
//! - Issue the session cookie for newly minted sessions
//! - Map transport failures to gateway statuses

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderValue, Request as HttpRequest},
    response::Response as HttpResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::BridgeConfig;
use crate::http::capture::{capture, CaptureSettings, HostFault};
use crate::http::render::{render, session_cookie, BufferedSink, ResponseSink};
use crate::observability::metrics;
use crate::protocol::{decode_response, encode_request, Request, Response};
use crate::transport::{BridgeClient, TransportError};

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// State injected into the bridging handler.
#[derive(Clone)]
pub struct FrontendState {
    pub client: BridgeClient,
    pub capture: Arc<CaptureSettings>,
    pub max_body_size: usize,
}

/// HTTP front end of the bridge.
pub struct FrontendServer {
    router: Router,
    config: BridgeConfig,
}

impl FrontendServer {
    /// Create a front end that bridges to `config.backend.address`.
    pub fn new(config: BridgeConfig) -> Self {
        let client = BridgeClient::new(config.backend.address.clone())
            .with_reply_timeout(config.backend.reply_timeout());

        let state = FrontendState {
            client,
            capture: Arc::new(CaptureSettings::from(&config.frontend)),
            max_body_size: config.frontend.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    fn build_router(config: &BridgeConfig, state: FrontendState) -> Router {
        Router::new()
            .route("/", any(bridge_handler))
            .route("/{*path}", any(bridge_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.frontend.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.address,
            "HTTP front end starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP front end stopped");
        Ok(())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Bridge one HTTP request to the backend and render its reply.
async fn bridge_handler(
    State(state): State<FrontendState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: HttpRequest<Body>,
) -> HttpResponse {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let (body, fault) = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => (bytes, None),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            (Bytes::new(), Some(HostFault::from_error(&e)))
        }
    };

    let captured = capture(&state.capture, &parts, peer, body, fault).await;
    let session_id = captured.request.session_id.clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %captured.request.path,
        session_id = %session_id,
        "Bridging request"
    );

    let response = round_trip(&state.client, &captured.request, &request_id).await;
    let status = response.status;
    let abandon_session = response.abandon_session;

    let mut sink = BufferedSink::new();
    if let Err(e) = render(response, &mut sink, &state.capture.session_cookie) {
        tracing::warn!(request_id = %request_id, error = %e, "Rendering stopped");
    }

    if captured.new_session && !abandon_session {
        match HeaderValue::from_str(&session_cookie(&state.capture.session_cookie, &session_id)) {
            Ok(value) => sink.append_header(header::SET_COOKIE, value),
            Err(e) => tracing::warn!(error = %e, "Skipping invalid session cookie"),
        }
    }

    metrics::record_request(&method, status, start_time);
    sink.into_response()
}

/// Exchange `request` with the backend.
///
/// Always yields something renderable: transport failures become gateway
/// responses, undecodable replies become the fallback response.
async fn round_trip(client: &BridgeClient, request: &Request, request_id: &str) -> Response {
    let message = match encode_request(request) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to encode request");
            metrics::record_transport_error("encode");
            return Response::fallback();
        }
    };

    let reply = match client.send(&message).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                backend = %client.address(),
                error = %e,
                "Bridge exchange failed"
            );
            return gateway_response(&e);
        }
    };

    match decode_response(&reply) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to decode backend reply");
            metrics::record_transport_error("decode");
            Response::fallback()
        }
    }
}

fn gateway_response(error: &TransportError) -> Response {
    match error {
        TransportError::Timeout(_) => {
            metrics::record_transport_error("timeout");
            Response::text(504, "text/html", "The application did not reply in time")
        }
        _ => {
            metrics::record_transport_error("unavailable");
            Response::text(502, "text/html", "The application is not reachable")
        }
    }
}
