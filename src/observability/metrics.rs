//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define bridge metrics (requests, round-trip latency, transport errors)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `bridge_requests_total` (counter): front-end requests by method, status
//! - `bridge_round_trip_seconds` (histogram): capture-to-render latency
//! - `bridge_transport_errors_total` (counter): failed exchanges by kind
//! - `app_requests_total` (counter): backend requests by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (no paths, no session ids)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed front-end request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "bridge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("bridge_round_trip_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a failed bridge exchange.
pub fn record_transport_error(kind: &'static str) {
    metrics::counter!("bridge_transport_errors_total", "kind" => kind).increment(1);
}

/// Record one request handled by the backend.
pub fn record_backend_request(outcome: &'static str) {
    metrics::counter!("app_requests_total", "outcome" => outcome).increment(1);
}
