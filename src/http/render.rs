//! Response rendering.
//!
//! # Responsibilities
//! - Apply a bridge [`Response`] to an outgoing HTTP response
//! - Expire the session cookie when the response abandons the session
//! - Contain body write faults as an in-page diagnostic
//!
//! # Design Decisions
//! - Rendering targets the [`ResponseSink`] trait, so the write path can be
//!   exercised with sinks that fail
//! - Single-valued headers are inserted, never duplicated; `Set-Cookie`
//!   is the only header appended
//! - Only [`RenderFault::Cancelled`] escapes; every other fault is reported
//!   to the user in the page itself

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use thiserror::Error;

use crate::protocol::Response;

/// Prefix of the diagnostic appended when writing the body fails.
pub const DIAGNOSTIC_PREFIX: &str = "Oops... An error has occurred!<br/><br/>";

#[derive(Debug, Error)]
pub enum RenderFault {
    #[error("failed to write response body: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("response rendering was cancelled")]
    Cancelled,
}

/// Destination of a rendered response.
pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);
    /// Set a single-valued header, replacing any earlier value.
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue);
    fn append_header(&mut self, name: HeaderName, value: HeaderValue);
    fn write(&mut self, chunk: &[u8]) -> Result<(), RenderFault>;
}

/// Sink that collects everything into an axum response.
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), RenderFault> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }
}

/// `Set-Cookie` value that expires `cookie_name` immediately.
pub fn expired_cookie(cookie_name: &str) -> String {
    format!("{cookie_name}=; Path=/; Max-Age=0")
}

/// `Set-Cookie` value that binds the browser to `session_id`.
pub fn session_cookie(cookie_name: &str, session_id: &str) -> String {
    format!("{cookie_name}={session_id}; Path=/; HttpOnly")
}

/// Apply `response` to `sink`.
///
/// Returns an error only when rendering was cancelled.
pub fn render<S>(mut response: Response, sink: &mut S, cookie_name: &str) -> Result<(), RenderFault>
where
    S: ResponseSink + ?Sized,
{
    response.coerce_redirect();

    sink.insert_header(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));

    if !response.content_type.is_empty() {
        match HeaderValue::from_str(&response.content_type) {
            Ok(value) => sink.insert_header(header::CONTENT_TYPE, value),
            Err(_) => tracing::warn!(content_type = %response.content_type, "Skipping invalid content type"),
        }
    }

    if response.abandon_session {
        if let Ok(value) = HeaderValue::from_str(&expired_cookie(cookie_name)) {
            sink.append_header(header::SET_COOKIE, value);
        }
    }

    // Application headers replace what the renderer set; only cookies accumulate.
    for (name, value) in response.headers.iter().flatten() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) if name == header::SET_COOKIE => sink.append_header(name, value),
            (Ok(name), Ok(value)) => sink.insert_header(name, value),
            _ => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }

    let outcome = match StatusCode::from_u16(response.status) {
        Ok(status) => {
            sink.set_status(status);
            write_body(&response, sink)
        }
        Err(_) => {
            sink.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            Err(RenderFault::InvalidStatus(response.status))
        }
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(RenderFault::Cancelled) => Err(RenderFault::Cancelled),
        Err(fault) => {
            tracing::warn!(error = %fault, "Failed to render response body");
            let diagnostic = format!("{DIAGNOSTIC_PREFIX}{fault}");
            if let Err(e) = sink.write(diagnostic.as_bytes()) {
                tracing::error!(error = %e, "Failed to write diagnostic");
            }
            Ok(())
        }
    }
}

fn write_body<S>(response: &Response, sink: &mut S) -> Result<(), RenderFault>
where
    S: ResponseSink + ?Sized,
{
    match (&response.body, &response.bytes) {
        (Some(body), _) if !body.is_empty() => sink.write(body.as_bytes()),
        (_, Some(bytes)) => sink.write(bytes),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails the first body write, records everything after.
    struct FlakySink {
        inner: BufferedSink,
        failed: bool,
        fault: fn() -> RenderFault,
    }

    impl FlakySink {
        fn new(fault: fn() -> RenderFault) -> Self {
            Self {
                inner: BufferedSink::new(),
                failed: false,
                fault,
            }
        }
    }

    impl ResponseSink for FlakySink {
        fn set_status(&mut self, status: StatusCode) {
            self.inner.set_status(status);
        }

        fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
            self.inner.insert_header(name, value);
        }

        fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
            self.inner.append_header(name, value);
        }

        fn write(&mut self, chunk: &[u8]) -> Result<(), RenderFault> {
            if !self.failed {
                self.failed = true;
                return Err((self.fault)());
            }
            self.inner.write(chunk)
        }
    }

    fn render_buffered(response: Response) -> BufferedSink {
        let mut sink = BufferedSink::new();
        render(response, &mut sink, "BRIDGE_SESSIONID").unwrap();
        sink
    }

    #[test]
    fn text_response_is_applied() {
        let sink = render_buffered(Response::text(200, "text/html", "/Index"));
        assert_eq!(sink.status, StatusCode::OK);
        assert_eq!(sink.headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(sink.headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(sink.body, b"/Index");
    }

    #[test]
    fn text_takes_precedence_over_bytes() {
        let mut response = Response::binary(200, "text/plain", vec![0x89, 0x50]);
        response.body = Some("text".into());
        assert_eq!(render_buffered(response).body, b"text");
    }

    #[test]
    fn empty_text_falls_back_to_bytes() {
        let mut response = Response::binary(200, "image/png", vec![0x89, 0x50]);
        response.body = Some(String::new());
        assert_eq!(render_buffered(response).body, vec![0x89, 0x50]);
    }

    #[test]
    fn location_forces_redirect() {
        let sink = render_buffered(Response::text(200, "text/html", "").with_header("Location", "/Login"));
        assert_eq!(sink.status, StatusCode::FOUND);
        assert_eq!(sink.headers[header::LOCATION], "/Login");
    }

    #[test]
    fn abandon_expires_cookie() {
        let mut response = Response::text(200, "text/html", "bye");
        response.abandon_session = true;
        let sink = render_buffered(response);
        assert_eq!(sink.headers[header::SET_COOKIE], "BRIDGE_SESSIONID=; Path=/; Max-Age=0");
    }

    #[test]
    fn conflicting_content_type_is_sent_once() {
        let response = Response::text(200, "text/html", "{}")
            .with_header("Content-Type", "application/json")
            .with_header("x-frame-options", "DENY");
        let sink = render_buffered(response);

        let content_types: Vec<_> = sink.headers.get_all(header::CONTENT_TYPE).iter().collect();
        assert_eq!(content_types, vec!["application/json"]);
        assert_eq!(sink.headers.get_all(header::X_FRAME_OPTIONS).iter().count(), 1);
    }

    #[test]
    fn application_cookie_joins_abandon_cookie() {
        let mut response = Response::text(200, "text/html", "bye").with_header("Set-Cookie", "theme=; Max-Age=0");
        response.abandon_session = true;
        let sink = render_buffered(response);
        assert_eq!(sink.headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn invalid_header_is_skipped() {
        let response = Response::text(200, "text/plain", "ok")
            .with_header("Bad Header", "x")
            .with_header("X-Good", "yes");
        let sink = render_buffered(response);
        assert_eq!(sink.headers["x-good"], "yes");
        assert_eq!(sink.body, b"ok");
    }

    #[test]
    fn invalid_status_becomes_diagnostic() {
        let sink = render_buffered(Response::text(1000, "text/html", "never"));
        assert_eq!(sink.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(sink.body).unwrap();
        assert!(body.starts_with(DIAGNOSTIC_PREFIX));
        assert!(body.contains("1000"));
    }

    #[test]
    fn write_fault_is_contained() {
        let mut sink = FlakySink::new(|| RenderFault::Io(std::io::Error::other("disk on fire")));
        let result = render(Response::text(200, "text/html", "page"), &mut sink, "S");

        assert!(result.is_ok());
        let body = String::from_utf8(sink.inner.body).unwrap();
        assert!(body.starts_with(DIAGNOSTIC_PREFIX));
        assert!(body.contains("disk on fire"));
    }

    #[test]
    fn cancellation_propagates() {
        let mut sink = FlakySink::new(|| RenderFault::Cancelled);
        let result = render(Response::text(200, "text/html", "page"), &mut sink, "S");
        assert!(matches!(result, Err(RenderFault::Cancelled)));
        assert!(sink.inner.body.is_empty());
    }
}
