//! Backend side of the bridge.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transport::{read_frame, write_frame, TransportError};

/// Complete requests waiting for the serial loop.
const PENDING_EXCHANGES: usize = 64;

/// How long a connection may take to deliver its request frame.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Listens at the fixed backend address and yields one exchange at a time.
///
/// Connections are accepted and their request frames read in background
/// tasks. [`receive`](Self::receive) only ever yields complete requests, so
/// a peer that connects and stays silent cannot hold up the others.
pub struct BridgeListener {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<Exchange>,
    acceptor: JoinHandle<()>,
}

impl BridgeListener {
    /// Bind the backend address. Failure here is fatal at startup.
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let inner = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Unavailable {
                address: address.to_string(),
                source,
            })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| TransportError::Io { context: "reading local address", source })?;

        let (tx, incoming) = mpsc::channel(PENDING_EXCHANGES);
        let acceptor = tokio::spawn(accept_loop(inner, tx));

        Ok(Self {
            local_addr,
            incoming,
            acceptor,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local_addr)
    }

    /// Wait for the next complete request.
    pub async fn receive(&mut self) -> Result<Exchange, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Closed)
    }
}

impl Drop for BridgeListener {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Exchange>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept bridge connection");
                continue;
            }
        };

        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(exchange) = read_request(stream, peer).await {
                // Receiver gone means the listener was dropped.
                let _ = tx.send(exchange).await;
            }
        });
    }
}

async fn read_request(mut stream: TcpStream, peer: SocketAddr) -> Option<Exchange> {
    match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_frame(&mut stream)).await {
        Ok(Ok(request)) => {
            tracing::trace!(peer = %peer, bytes = request.len(), "Bridge request received");
            Some(Exchange { stream, peer, request })
        }
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer, error = %e, "Dropping connection without a request");
            None
        }
        Err(_) => {
            tracing::debug!(peer = %peer, "Dropping idle connection");
            None
        }
    }
}

/// One received request awaiting its single reply.
#[derive(Debug)]
pub struct Exchange {
    stream: TcpStream,
    peer: SocketAddr,
    request: String,
}

impl Exchange {
    /// The request text as sent by the front end.
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Front-end connection this request arrived on.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send the reply; the exchange is finished afterwards.
    pub async fn reply(mut self, reply_text: &str) -> Result<(), TransportError> {
        write_frame(&mut self.stream, reply_text).await
    }
}
