//! Request/reply transport between the front end and the backend.
//!
//! # Data Flow
//! ```text
//! front end                                 backend
//!   BridgeClient::send ──connect──▶ BridgeListener::receive
//!         │        ──[request frame]──▶         │
//!         │                               application logic
//!         │        ◀──[reply frame]──   Exchange::reply
//!   (connection dropped)
//! ```
//!
//! Frame layout: `[4-byte length, u32 big-endian] [UTF-8 text]`.
//!
//! # Design Decisions
//! - One fresh connection per call, no pooling or multiplexing
//! - Exactly one request and one reply per connection
//! - The backend serves one exchange at a time; frames are read per
//!   connection so only complete requests reach the serial loop
//! - No reply timeout unless one is configured

pub mod client;
pub mod server;

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use client::BridgeClient;
pub use server::{BridgeListener, Exchange};

/// Largest frame either side will accept.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Errors raised by the bridge transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Backend address could not be bound or reached.
    #[error("bridge endpoint {address} unavailable: {source}")]
    Unavailable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection failed mid-exchange.
    #[error("bridge I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// No reply within the configured timeout.
    #[error("no reply from bridge within {0:?}")]
    Timeout(Duration),

    /// Peer announced a frame above [`MAX_FRAME_SIZE`].
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// Listener stopped accepting connections.
    #[error("bridge listener closed")]
    Closed,

    /// Frame payload is not UTF-8 text.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Write one length-prefixed text frame.
pub async fn write_frame<W>(stream: &mut W, text: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let data = text.as_bytes();
    if data.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(data.len()));
    }
    let len = data.len() as u32;

    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|source| TransportError::Io { context: "writing length prefix", source })?;
    stream
        .write_all(data)
        .await
        .map_err(|source| TransportError::Io { context: "writing frame", source })?;
    stream
        .flush()
        .await
        .map_err(|source| TransportError::Io { context: "flushing stream", source })?;

    Ok(())
}

/// Read one length-prefixed text frame.
pub async fn read_frame<R>(stream: &mut R) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|source| TransportError::Io { context: "reading length prefix", source })?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|source| TransportError::Io { context: "reading frame", source })?;

    Ok(String::from_utf8(buf)?)
}
