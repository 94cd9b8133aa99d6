//! Encoding of bridge messages to and from wire text.

use thiserror::Error;

use crate::protocol::compression::{compress, decompress};
use crate::protocol::message::{Request, Response};

/// Errors produced while encoding or decoding bridge messages.
///
/// Every variant is answered with [`Response::fallback`] at the boundary
/// where it occurs; none of them crosses the process boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Text is not JSON or does not have the expected message shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Compressed payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// DEFLATE stream could not be produced or read.
    #[error("deflate failure: {0}")]
    Deflate(std::io::Error),

    /// Payload shorter than its own length prefix.
    #[error("compressed payload truncated to {0} bytes")]
    Truncated(usize),

    /// Decompressed size differs from the length prefix.
    #[error("decompressed {actual} bytes, length prefix says {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Payload does not fit the 32-bit length prefix.
    #[error("payload of {0} bytes is too large to compress")]
    TooLarge(usize),

    /// Message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Encode a request as plain JSON text.
pub fn encode_request(request: &Request) -> Result<String, CodecError> {
    serde_json::to_string(request).map_err(CodecError::Encode)
}

/// Decode a request, rejecting anything without a session identifier.
pub fn decode_request(text: &str) -> Result<Request, CodecError> {
    let request: Option<Request> =
        serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let request = request.ok_or_else(|| CodecError::Malformed("null request".to_string()))?;
    if request.session_id.is_empty() {
        return Err(CodecError::Malformed("missing session identifier".to_string()));
    }

    Ok(request)
}

/// Encode a response as JSON, then compress it into its wire form.
pub fn encode_response(response: &Response) -> Result<String, CodecError> {
    let json = serde_json::to_vec(response).map_err(CodecError::Encode)?;
    compress(&json)
}

/// Decompress the wire form, then decode the JSON response.
pub fn decode_response(text: &str) -> Result<Response, CodecError> {
    let json = decompress(text)?;
    let response: Option<Response> =
        serde_json::from_slice(&json).map_err(|e| CodecError::Malformed(e.to_string()))?;

    response.ok_or_else(|| CodecError::Malformed("null response".to_string()))
}

/// Decode a request, or produce the fixed fallback response to send instead.
pub fn decode_request_or_fallback(text: &str) -> Result<Request, Response> {
    decode_request(text).map_err(|e| {
        tracing::warn!(error = %e, "Could not decode bridged request");
        Response::fallback()
    })
}
