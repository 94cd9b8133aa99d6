//! HTTP-to-application bridge library.
//!
//! The front end accepts HTTP, captures each request into a bridge
//! [`protocol::Request`], and exchanges it over the transport with a
//! separate application process. The backend runs application logic
//! against per-session and application-wide stores and replies with a
//! [`protocol::Response`], which the front end renders.

// Wire format and transport
pub mod protocol;
pub mod transport;

// The two processes
pub mod backend;
pub mod http;
pub mod state;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use backend::{AppHost, AppServer, Application};
pub use config::BridgeConfig;
pub use http::FrontendServer;
pub use lifecycle::Shutdown;
pub use protocol::{Request, Response};
