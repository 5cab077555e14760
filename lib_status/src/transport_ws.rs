//! WebSocket [`Transport`] backed by tokio-tungstenite.
//!
//! The stream is split: a writer task drains an unbounded outbound channel
//! into the sink, a reader task translates tungstenite messages into
//! [`SocketEvent`]s. Both tasks end on their own once the socket dies, so
//! the handle can be dropped without ceremony.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use crate::transport::{SocketEvent, SocketEvents, SocketHandle, Transport, TransportError};

enum Outbound {
    Text(String),
    Close,
}

/// Production transport for the status stream.
#[derive(Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

struct WsSocketHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl SocketHandle for WsSocketHandle {
    fn send_text(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(frame))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SocketHandle>, SocketEvents), TransportError> {
        log::info!("Connecting to status stream: {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    Outbound::Text(text) => {
                        // .into() converts String to Utf8Bytes for newer tungstenite versions
                        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                            log::error!("Failed to send frame: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = write.close().await;
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        let _ = event_tx.send(SocketEvent::Frame(text.to_string()));
                    }
                    Ok(WsMessage::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                            None => (None, String::new()),
                        };
                        let _ = event_tx.send(SocketEvent::Closed { code, reason });
                        return;
                    }
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("Socket read error: {}", e);
                        let _ = event_tx.send(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            // Stream ended without a close frame (remote vanished).
            let _ = event_tx.send(SocketEvent::Closed {
                code: None,
                reason: String::new(),
            });
        });

        Ok((Arc::new(WsSocketHandle { outbound: outbound_tx }), event_rx))
    }
}
