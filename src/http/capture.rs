//! Request capture.
//!
//! # Responsibilities
//! - Build a bridge [`Request`] from the live axum request
//! - Reuse or mint the session identifier
//! - Keep form and query values raw: decoded, never sanitized
//! - Carry host faults so the backend can render a diagnostic page
//!
//! # Design Decisions
//! - Header, cookie and body maps keep the first occurrence of a key
//! - `files` is absent, not empty, when nothing was uploaded
//! - Capture never fails; problems become the request's `error`

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, request::Parts, HeaderMap};
use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::config::FrontendConfig;
use crate::protocol::{PostedFile, Request};

/// Header consulted for the original client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Header consulted for the original request scheme.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Front-end settings that influence capture.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub session_cookie: String,
    pub identity_header: Option<String>,
    pub client_cert_header: Option<String>,
}

impl From<&FrontendConfig> for CaptureSettings {
    fn from(config: &FrontendConfig) -> Self {
        Self {
            session_cookie: config.session_cookie.clone(),
            identity_header: config.identity_header.clone(),
            client_cert_header: config.client_cert_header.clone(),
        }
    }
}

/// An unhandled fault the host hit while reading the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFault {
    pub message: String,
    pub trace: String,
}

impl HostFault {
    /// Message from the error, trace from its source chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            message: err.to_string(),
            trace,
        }
    }
}

/// Result of capturing one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub request: Request,
    /// The session id was minted for this request and needs a cookie.
    pub new_session: bool,
}

/// Build the bridge request for one HTTP call.
pub async fn capture(
    settings: &CaptureSettings,
    parts: &Parts,
    peer: SocketAddr,
    body: Bytes,
    fault: Option<HostFault>,
) -> Captured {
    let mut fault = fault;

    let header_blob = header_blob(&parts.headers);
    let headers = split_pairs(&header_blob, '\n', ':');
    let cookies = split_pairs(&joined_header(&parts.headers, header::COOKIE, "; "), ';', '=');

    let (session_id, new_session) = match cookies.get(&settings.session_cookie) {
        Some(id) if !id.is_empty() => (id.clone(), false),
        _ => (Uuid::new_v4().simple().to_string(), true),
    };

    let query_string = parts
        .uri
        .query()
        .map(|q| decode_form(q.as_bytes()))
        .unwrap_or_default();

    let content_type = first_header(&parts.headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    let mut body_map = BTreeMap::new();
    let mut form = BTreeMap::new();
    let mut files = Vec::new();

    if is_multipart(&content_type) {
        match read_multipart(parts, body).await {
            Ok((fields, uploaded)) => {
                form = fields;
                files = uploaded;
            }
            Err(multipart_fault) => {
                tracing::warn!(error = %multipart_fault.message, "Failed to read multipart body");
                fault.get_or_insert(multipart_fault);
            }
        }
    } else {
        if is_form_urlencoded(&content_type) {
            form = decode_form(&body);
        }
        body_map = split_pairs(&String::from_utf8_lossy(&body), '&', '=');
    }

    let is_secure = first_header(&parts.headers, X_FORWARDED_PROTO)
        .and_then(|proto| proto.split(',').next().map(|p| p.trim().eq_ignore_ascii_case("https")))
        .unwrap_or(false);
    let url_scheme = if is_secure { "https" } else { "http" };

    let host = first_header(&parts.headers, header::HOST.as_str())
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let server_variables = server_variables(parts, peer, &host, is_secure, &header_blob, &headers);

    let identity = settings
        .identity_header
        .as_deref()
        .and_then(|name| first_header(&parts.headers, name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let client_certificate = settings
        .client_cert_header
        .as_deref()
        .and_then(|name| first_header(&parts.headers, name))
        .and_then(|value| certificate_der(&value));

    let request = Request {
        session_id,
        url_scheme: url_scheme.to_string(),
        is_secure,
        url: format!("{url_scheme}://{host}{path_and_query}"),
        method: parts.method.to_string(),
        path_base: None,
        path: parts.uri.path().to_string(),
        server_variables,
        headers,
        query_string,
        cookies,
        body: body_map,
        form,
        files: if files.is_empty() { None } else { Some(files) },
        ip_address: client_ip(&parts.headers, peer),
        error: fault.as_ref().map(|f| f.message.clone()),
        error_stack_trace: fault.map(|f| f.trace),
        identity,
        client_certificate,
    };

    Captured { request, new_session }
}

/// Split `value` on `split_on`, then each entry on the first `delimiter`.
///
/// Both sides are trimmed, empty keys are dropped, first occurrence wins.
pub fn split_pairs(value: &str, split_on: char, delimiter: char) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();

    for entry in value.split(split_on).filter(|entry| !entry.is_empty()) {
        let (key, val) = entry.split_once(delimiter).unwrap_or((entry, ""));
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        result.entry(key.to_string()).or_insert_with(|| val.trim().to_string());
    }

    result
}

/// The first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    first_header(headers, X_FORWARDED_FOR)
        .and_then(|forwarded| forwarded.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// All headers as `Name: value` lines, the shape of a raw HTTP header block.
pub fn header_blob(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            format!("{}: {}", canonical_name(name.as_str()), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn first_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn joined_header(headers: &HeaderMap, name: header::HeaderName, separator: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}

fn decode_form(input: &[u8]) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        result.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    result
}

fn is_multipart(content_type: &str) -> bool {
    content_type.trim_start().to_ascii_lowercase().starts_with("multipart/form-data")
}

fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("application/x-www-form-urlencoded")
}

async fn read_multipart(
    parts: &Parts,
    body: Bytes,
) -> Result<(BTreeMap<String, String>, Vec<PostedFile>), HostFault> {
    let request = axum::http::Request::from_parts(parts.clone(), Body::from(body));
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| HostFault::from_error(&rejection))?;

    let mut form = BTreeMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HostFault::from_error(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(|e| HostFault::from_error(&e))?;

        match file_name {
            Some(file_name) => files.push(PostedFile {
                content_type,
                file_name,
                file_bytes: data.to_vec(),
            }),
            None => {
                form.entry(name)
                    .or_insert_with(|| String::from_utf8_lossy(&data).into_owned());
            }
        }
    }

    Ok((form, files))
}

/// URL-escaped PEM (as forwarded by TLS-terminating proxies) to DER bytes.
fn certificate_der(escaped_pem: &str) -> Option<Vec<u8>> {
    let pem = percent_decode_str(escaped_pem).decode_utf8_lossy();
    let mut reader = pem.as_bytes();
    let der = match rustls_pemfile::certs(&mut reader).next() {
        Some(Ok(cert)) => Some(cert.as_ref().to_vec()),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Ignoring unparsable client certificate");
            None
        }
        None => None,
    };
    der
}

fn server_variables(
    parts: &Parts,
    peer: SocketAddr,
    host: &str,
    is_secure: bool,
    header_blob: &str,
    headers: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let (server_name, server_port) = match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() => (name.to_string(), port.to_string()),
        _ => (host.to_string(), if is_secure { "443" } else { "80" }.to_string()),
    };

    let mut vars = BTreeMap::new();
    vars.insert("REQUEST_METHOD".to_string(), parts.method.to_string());
    vars.insert("PATH_INFO".to_string(), parts.uri.path().to_string());
    vars.insert("URL".to_string(), parts.uri.path().to_string());
    vars.insert("QUERY_STRING".to_string(), parts.uri.query().unwrap_or_default().to_string());
    vars.insert("SERVER_PROTOCOL".to_string(), format!("{:?}", parts.version));
    vars.insert("REMOTE_ADDR".to_string(), peer.ip().to_string());
    vars.insert("REMOTE_PORT".to_string(), peer.port().to_string());
    vars.insert("HTTPS".to_string(), if is_secure { "on" } else { "off" }.to_string());
    vars.insert("SERVER_NAME".to_string(), server_name);
    vars.insert("SERVER_PORT".to_string(), server_port);
    vars.insert("ALL_HTTP".to_string(), header_blob.to_string());

    for (name, value) in headers {
        let key = format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"));
        vars.entry(key).or_insert_with(|| value.clone());
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn settings() -> CaptureSettings {
        CaptureSettings::from(&FrontendConfig {
            identity_header: Some("X-Remote-User".into()),
            client_cert_header: Some("X-Client-Cert".into()),
            ..FrontendConfig::default()
        })
    }

    fn peer() -> SocketAddr {
        "192.168.1.20:51000".parse().unwrap()
    }

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn split_pairs_keeps_first_and_trims() {
        let pairs = split_pairs("a=1& b = 2 &a=3&&flag&=orphan", '&', '=');
        assert_eq!(pairs.get("a").map(String::as_str), Some("1"));
        assert_eq!(pairs.get("b").map(String::as_str), Some("2"));
        assert_eq!(pairs.get("flag").map(String::as_str), Some(""));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn headers_split_on_first_colon_only() {
        let pairs = split_pairs("Host: example.com:8080\nReferer: http://x/y", '\n', ':');
        assert_eq!(pairs.get("Host").map(String::as_str), Some("example.com:8080"));
        assert_eq!(pairs.get("Referer").map(String::as_str), Some("http://x/y"));
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()), "192.168.1.20");

        headers.insert(X_FORWARDED_FOR, "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[tokio::test]
    async fn existing_session_cookie_is_reused() {
        let parts = parts(
            HttpRequest::get("/Index")
                .header("Host", "example.com")
                .header("Cookie", "theme=dark; BRIDGE_SESSIONID=abc123"),
        );
        let captured = capture(&settings(), &parts, peer(), Bytes::new(), None).await;

        assert!(!captured.new_session);
        assert_eq!(captured.request.session_id, "abc123");
        assert_eq!(captured.request.cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn missing_session_is_minted_without_dashes() {
        let parts = parts(HttpRequest::get("/"));
        let captured = capture(&settings(), &parts, peer(), Bytes::new(), None).await;

        assert!(captured.new_session);
        assert_eq!(captured.request.session_id.len(), 32);
        assert!(!captured.request.session_id.contains('-'));
    }

    #[tokio::test]
    async fn form_and_query_stay_raw() {
        let parts = parts(
            HttpRequest::post("/Wiki/Edit?page=%3Cscript%3E&page=second")
                .header("Host", "wiki.local:8080")
                .header("Content-Type", "application/x-www-form-urlencoded"),
        );
        let body = Bytes::from_static(b"content=%3Cb%3Ehi%3C%2Fb%3E&content=dup");
        let captured = capture(&settings(), &parts, peer(), body, None).await;
        let request = captured.request;

        assert_eq!(request.query_string.get("page").map(String::as_str), Some("<script>"));
        assert_eq!(request.form.get("content").map(String::as_str), Some("<b>hi</b>"));
        assert_eq!(
            request.body.get("content").map(String::as_str),
            Some("%3Cb%3Ehi%3C%2Fb%3E")
        );
        assert_eq!(request.url, "http://wiki.local:8080/Wiki/Edit?page=%3Cscript%3E&page=second");
        assert_eq!(request.server_variables.get("SERVER_PORT").map(String::as_str), Some("8080"));
        assert_eq!(request.server_variables.get("HTTP_HOST").map(String::as_str), Some("wiki.local:8080"));
        assert!(request.files.is_none());
    }

    #[tokio::test]
    async fn forwarded_proto_marks_secure() {
        let parts = parts(
            HttpRequest::get("/")
                .header("Host", "example.com")
                .header("X-Forwarded-Proto", "https"),
        );
        let request = capture(&settings(), &parts, peer(), Bytes::new(), None).await.request;

        assert!(request.is_secure);
        assert_eq!(request.url_scheme, "https");
        assert_eq!(request.server_variables.get("HTTPS").map(String::as_str), Some("on"));
    }

    #[tokio::test]
    async fn multipart_files_and_fields_are_captured() {
        let body = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "Holiday\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "line one\r\n",
            "--XyZ--\r\n",
        );
        let parts = parts(
            HttpRequest::post("/Upload").header("Content-Type", "multipart/form-data; boundary=XyZ"),
        );
        let request = capture(&settings(), &parts, peer(), Bytes::from(body), None)
            .await
            .request;

        assert_eq!(request.form.get("title").map(String::as_str), Some("Holiday"));
        let files = request.files.expect("one uploaded file");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "notes.txt");
        assert_eq!(files[0].content_type, "text/plain");
        assert_eq!(files[0].file_bytes, b"line one");
        assert!(request.body.is_empty());
        assert!(request.error.is_none());
    }

    #[tokio::test]
    async fn broken_multipart_becomes_fault() {
        let parts = parts(
            HttpRequest::post("/Upload").header("Content-Type", "multipart/form-data; boundary=XyZ"),
        );
        let request = capture(&settings(), &parts, peer(), Bytes::from_static(b"garbage"), None)
            .await
            .request;

        assert!(request.error.is_some());
        assert!(request.error_stack_trace.is_some());
    }

    #[tokio::test]
    async fn host_fault_is_carried() {
        let fault = HostFault::from_error(&std::io::Error::other("length limit exceeded"));
        let parts = parts(HttpRequest::post("/"));
        let request = capture(&settings(), &parts, peer(), Bytes::new(), Some(fault)).await.request;

        assert_eq!(request.error.as_deref(), Some("length limit exceeded"));
        assert!(request.error_stack_trace.unwrap().starts_with("length limit exceeded"));
    }

    #[tokio::test]
    async fn identity_header_is_captured() {
        let parts = parts(HttpRequest::get("/").header("X-Remote-User", " alice "));
        let request = capture(&settings(), &parts, peer(), Bytes::new(), None).await.request;
        assert_eq!(request.identity.as_deref(), Some("alice"));
        assert!(request.client_certificate.is_none());
    }

    #[tokio::test]
    async fn escaped_pem_certificate_becomes_der() {
        use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
        use base64::Engine;
        use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

        let der: Vec<u8> = vec![0x30, 0x0b, 0x02, 0x01, 0x05, 0x04, 0x06, b'b', b'r', b'i', b'd', b'g', b'e'];
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            BASE64_STANDARD.encode(&der)
        );
        let escaped = utf8_percent_encode(&pem, NON_ALPHANUMERIC).to_string();

        let parts = parts(HttpRequest::get("/").header("X-Client-Cert", escaped));
        let request = capture(&settings(), &parts, peer(), Bytes::new(), None).await.request;

        assert_eq!(request.client_certificate, Some(der));
    }

    #[test]
    fn garbage_certificate_is_ignored() {
        assert!(certificate_der("not%20a%20pem").is_none());
    }

    #[test]
    fn header_names_are_canonicalized() {
        assert_eq!(canonical_name("x-forwarded-for"), "X-Forwarded-For");
        assert_eq!(canonical_name("host"), "Host");
    }
}
