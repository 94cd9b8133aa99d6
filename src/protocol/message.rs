//! Request and response messages exchanged over the bridge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status forced onto any response that carries a `Location` header.
pub const REDIRECT_STATUS: u16 = 302;

/// Body of the fixed response sent when a message cannot be processed.
pub const FALLBACK_BODY: &str = "Could not process this request";

/// A file uploaded with the request, fully read into memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostedFile {
    pub content_type: String,
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub file_bytes: Vec<u8>,
}

/// One captured HTTP request.
///
/// `session_id` is the only correlation key into the backend stores and is
/// never empty once the request leaves the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    pub session_id: String,
    pub url_scheme: String,
    pub is_secure: bool,
    pub url: String,
    pub method: String,
    /// Application path, stamped by the backend before dispatch.
    pub path_base: Option<String>,
    pub path: String,
    pub server_variables: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub query_string: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: BTreeMap<String, String>,
    pub form: BTreeMap<String, String>,
    /// Absent rather than empty when nothing was uploaded.
    pub files: Option<Vec<PostedFile>>,
    pub ip_address: String,
    pub error: Option<String>,
    pub error_stack_trace: Option<String>,
    pub identity: Option<String>,
    #[serde(with = "base64_bytes::option")]
    pub client_certificate: Option<Vec<u8>>,
}

/// The application's answer to a [`Request`].
///
/// At most one of `body` and `bytes` is meaningful; renderers check `body`
/// first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Response {
    pub headers: Option<BTreeMap<String, String>>,
    pub status: u16,
    pub content_type: String,
    pub body: Option<String>,
    #[serde(with = "base64_bytes::option")]
    pub bytes: Option<Vec<u8>>,
    pub abandon_session: bool,
}

impl Response {
    /// A textual response.
    pub fn text(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// A binary response.
    pub fn binary(status: u16, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// The fixed response for messages that could not be decoded or handled.
    pub fn fallback() -> Self {
        Self::text(500, "text/html", FALLBACK_BODY)
    }

    /// Add a header, creating the header map on first use.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// The `Location` header, matched case-insensitively.
    pub fn location(&self) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("location"))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Force the redirect status when a `Location` header is present.
    ///
    /// Returns the redirect target if the status was coerced.
    pub fn coerce_redirect(&mut self) -> Option<String> {
        let location = self.location()?.to_string();
        self.status = REDIRECT_STATUS;
        Some(location)
    }
}

/// Serde adapter encoding byte buffers as standard base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(encoded) => BASE64_STANDARD
                    .decode(encoded.as_bytes())
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
