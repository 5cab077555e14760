//! The socket seam: the connection manager owns lifecycle and state, but
//! talks to the network through these traits so tests (and any future
//! non-WebSocket carrier) can swap the wire out.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open socket: {0}")]
    Open(String),

    #[error("socket is closed")]
    Closed,
}

/// Low-level notifications from an open socket, delivered in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// One inbound text frame.
    Frame(String),
    /// A read-side error; a `Closed` event follows.
    Error(String),
    /// The socket is gone, with the close code/reason when the peer sent one.
    Closed { code: Option<u16>, reason: String },
}

/// Receiving half for a socket's event stream.
pub type SocketEvents = mpsc::UnboundedReceiver<SocketEvent>;

/// Write half of an open socket.
pub trait SocketHandle: Send + Sync {
    /// Queues one outbound text frame.
    fn send_text(&self, frame: String) -> Result<(), TransportError>;
    /// Requests a graceful close; further events still drain through the
    /// event stream.
    fn close(&self);
}

/// Opens sockets. One open call yields one handle plus the event stream for
/// that socket's whole lifetime.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SocketHandle>, SocketEvents), TransportError>;
}
