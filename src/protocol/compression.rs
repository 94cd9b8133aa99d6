//! Response payload compression.
//!
//! Wire layout, base64-encoded as a whole:
//! ```text
//! [4-byte uncompressed length, u32 little-endian] [raw DEFLATE stream]
//! ```

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::protocol::codec::CodecError;

const LENGTH_PREFIX: usize = 4;

/// Upper bound on the buffer pre-sized from an untrusted length prefix.
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Compress `payload` into the base64 wire form.
pub fn compress(payload: &[u8]) -> Result<String, CodecError> {
    let length = u32::try_from(payload.len()).map_err(|_| CodecError::TooLarge(payload.len()))?;

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX + payload.len() / 2);
    buffer.extend_from_slice(&length.to_le_bytes());

    let mut encoder = DeflateEncoder::new(buffer, Compression::default());
    encoder.write_all(payload).map_err(CodecError::Deflate)?;
    let buffer = encoder.finish().map_err(CodecError::Deflate)?;

    Ok(BASE64_STANDARD.encode(buffer))
}

/// Reverse [`compress`].
///
/// The decompressed length must equal the length prefix exactly.
pub fn decompress(text: &str) -> Result<Vec<u8>, CodecError> {
    let buffer = BASE64_STANDARD
        .decode(text.trim().as_bytes())
        .map_err(CodecError::Base64)?;

    if buffer.len() < LENGTH_PREFIX {
        return Err(CodecError::Truncated(buffer.len()));
    }

    let (prefix, compressed) = buffer.split_at(LENGTH_PREFIX);
    let expected = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;

    let mut payload = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    DeflateDecoder::new(compressed)
        .read_to_end(&mut payload)
        .map_err(CodecError::Deflate)?;

    if payload.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: payload.len(),
        });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_restores_bytes() {
        for payload in [
            Vec::new(),
            b"x".to_vec(),
            b"<html><body>hello</body></html>".repeat(200),
            (0..=255u8).cycle().take(70_000).collect(),
        ] {
            assert_eq!(decompress(&compress(&payload).unwrap()).unwrap(), payload);
        }
    }

    #[test]
    fn prefix_holds_uncompressed_length() {
        let payload = b"abcabcabcabcabcabc".repeat(50);
        let raw = BASE64_STANDARD.decode(compress(&payload).unwrap()).unwrap();
        let prefix = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        assert_eq!(prefix as usize, payload.len());
        assert!(raw.len() < payload.len());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let mut raw = BASE64_STANDARD.decode(compress(b"hello world").unwrap()).unwrap();
        raw[..4].copy_from_slice(&99u32.to_le_bytes());
        let tampered = BASE64_STANDARD.encode(raw);

        match decompress(&tampered) {
            Err(CodecError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, 99);
                assert_eq!(actual, 11);
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn short_buffer_is_truncated() {
        let text = BASE64_STANDARD.encode([1u8, 2]);
        assert!(matches!(decompress(&text), Err(CodecError::Truncated(2))));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(matches!(decompress("not base64!!"), Err(CodecError::Base64(_))));
    }
}
