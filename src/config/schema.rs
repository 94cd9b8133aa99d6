//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both bridge
//! processes. All types derive Serde traits for deserialization from config
//! files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the front end and the backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP-facing process settings.
    pub frontend: FrontendConfig,

    /// Application process settings, including the fixed bridge address.
    pub backend: BackendConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Front-end (HTTP listener) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Cookie carrying the session identifier.
    pub session_cookie: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Header set by an authenticating proxy with the user's name.
    pub identity_header: Option<String>,

    /// Header set by a TLS-terminating proxy with the URL-escaped client
    /// certificate PEM.
    pub client_cert_header: Option<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            session_cookie: "BRIDGE_SESSIONID".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            identity_header: None,
            client_cert_header: None,
        }
    }
}

/// Backend (application process) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Fixed bridge address the backend binds and the front end dials.
    pub address: String,

    /// Application name, used in logs.
    pub name: String,

    /// Application root path, stamped on every request as `pathBase`.
    pub path: String,

    /// Reply timeout in seconds. Unset means wait forever.
    pub reply_timeout_secs: Option<u64>,
}

impl BackendConfig {
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".to_string(),
            name: "app".to_string(),
            path: ".".to_string(),
            reply_timeout_secs: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
