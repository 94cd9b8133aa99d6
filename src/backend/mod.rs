//! Backend (application process) subsystem.
//!
//! # Data Flow
//! ```text
//! BridgeListener::receive
//!     → codec::decode_request (fallback response on failure)
//!     → Application::handle(request, &mut RequestHost)
//!           ├─ session / application store accessors
//!           └─ render(response)            exactly once
//!     → Response::coerce_redirect
//!     → codec::encode_response → Exchange::reply
//! ```
//!
//! # Design Decisions
//! - Strictly one request at a time; the loop is the serialization point
//! - Application logic sees only the `AppHost` trait, never the raw stores

pub mod host;
pub mod server;

pub use host::{AppHost, Application, RequestHost};
pub use server::AppServer;
