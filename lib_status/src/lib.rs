//! # lib_status
//!
//! Resilient real-time client for the game-network status stream: one
//! logical long-lived WebSocket connection that survives interruptions and
//! republishes a typed event stream to downstream consumers.

// Declare the modules to re-export
pub mod client;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod emitter;
pub mod events;
pub mod maintenance;
pub mod parser;
pub mod reconnect;
pub mod router;
pub mod transport;
pub mod transport_ws;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the surface most consumers need
pub use client::StatusClient;
pub use config::ConnectionConfig;
pub use connection::{ConnectionError, ConnectionManager, ConnectionState, StateChange};
pub use coordinator::{ConnectFn, EventCoordinator};
pub use emitter::{EventEmitter, ListenerId};
pub use events::{ClientEvent, EventName};
pub use maintenance::{MaintenanceHandler, MaintenanceState};
pub use parser::{Envelope, ParseError, ServerEntry};
pub use reconnect::{ReconnectProgress, ReconnectStrategy};
pub use router::MessageRouter;
pub use transport::{SocketEvent, SocketHandle, Transport, TransportError};
pub use transport_ws::WsTransport;
