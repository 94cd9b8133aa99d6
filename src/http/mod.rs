//! HTTP front end subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit)
//!     → capture.rs (HTTP request → bridge Request)
//!     → transport::BridgeClient (one exchange with the backend)
//!     → render.rs (bridge Response → HTTP response)
//!     → Send to client
//! ```

pub mod capture;
pub mod render;
pub mod server;

pub use capture::{capture, CaptureSettings, Captured, HostFault};
pub use render::{render, BufferedSink, RenderFault, ResponseSink};
pub use server::{FrontendServer, X_REQUEST_ID};
