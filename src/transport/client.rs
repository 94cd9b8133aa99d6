//! Front-end side of the bridge.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::transport::{read_frame, write_frame, TransportError};

/// Sends bridged requests to the backend at one fixed address.
///
/// Every [`send`](Self::send) opens its own connection, so a client can be
/// shared freely between concurrent front-end tasks.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    address: String,
    reply_timeout: Option<Duration>,
}

impl BridgeClient {
    /// Create a client that waits indefinitely for replies.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reply_timeout: None,
        }
    }

    /// Bound the whole exchange (connect, send, reply) by `timeout`.
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Backend address this client talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one request and wait for its reply.
    ///
    /// Without a configured timeout this waits as long as the backend takes,
    /// including forever if it hangs.
    pub async fn send(&self, request_text: &str) -> Result<String, TransportError> {
        match self.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(request_text))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.exchange(request_text).await,
        }
    }

    async fn exchange(&self, request_text: &str) -> Result<String, TransportError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| TransportError::Unavailable {
                address: self.address.clone(),
                source,
            })?;

        write_frame(&mut stream, request_text).await?;
        let reply = read_frame(&mut stream).await?;

        tracing::trace!(
            backend = %self.address,
            request_bytes = request_text.len(),
            reply_bytes = reply.len(),
            "Bridge exchange complete"
        );
        Ok(reply)
    }
}
