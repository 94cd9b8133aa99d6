//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::{BackendConfig, BridgeConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.frontend.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "frontend.bind_address",
            format!("'{}' is not a socket address", config.frontend.bind_address),
        ));
    }
    if config.frontend.max_body_size == 0 {
        errors.push(ValidationError::new("frontend.max_body_size", "must be greater than zero"));
    }
    if !is_cookie_name(&config.frontend.session_cookie) {
        errors.push(ValidationError::new(
            "frontend.session_cookie",
            format!("'{}' is not a valid cookie name", config.frontend.session_cookie),
        ));
    }

    // host:port, where host may be a name resolved at connect time
    match config.backend.address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
        _ => errors.push(ValidationError::new(
            "backend.address",
            format!("'{}' is not a host:port address", config.backend.address),
        )),
    }
    if config.backend.name.trim().is_empty() {
        errors.push(ValidationError::new("backend.name", "must not be empty"));
    }
    if config.backend.reply_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "backend.reply_timeout_secs",
            "must be greater than zero when set",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that the application directory exists.
///
/// Only the backend calls this; the front end may run on a host without
/// the application's files.
pub fn check_application_path(config: &BackendConfig) -> Result<(), ValidationError> {
    if Path::new(&config.path).is_dir() {
        Ok(())
    } else {
        Err(ValidationError::new(
            "backend.path",
            format!("application directory '{}' does not exist", config.path),
        ))
    }
}

fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
