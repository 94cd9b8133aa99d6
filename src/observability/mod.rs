//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Front end and backend produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every front-end log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
