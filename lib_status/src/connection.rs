//! # Connection Manager
//!
//! Owns the socket handle and its lifecycle state machine:
//!
//! ```text
//! DISCONNECTED -(connect)-> CONNECTING -(open ok)-> CONNECTED
//!      ^                        |                       |
//!      |                        +--(open err/timeout)-> FAILED
//!      +----------------(socket closes / disconnect)----+
//! ```
//!
//! `RECONNECTING` is never entered by the manager itself; the coordinator
//! layers it on via [`ConnectionManager::set_reconnecting`] as a visible
//! marker between a drop and the next attempt. The manager knows nothing
//! about retry policy.
//!
//! The manager is a cheap clone over shared inner state, so the spawned
//! reader task and the rest of the client can hold it freely.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::emitter::{next_listener_id, run_isolated, ListenerId};
use crate::transport::{SocketEvent, SocketEvents, SocketHandle, Transport, TransportError};

/// Socket lifecycle state. Single source of truth, only ever written by the
/// owning [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }
}

/// Published to every state observer on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Close metadata from the most recent socket loss.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub code: Option<u16>,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection attempt timed out after {0} ms")]
    Timeout(u64),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no open socket")]
    NotConnected,

    #[error("connection manager has been closed")]
    ManagerClosed,
}

type StateListener = Arc<dyn Fn(&StateChange) + Send + Sync>;
type FrameListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    config: Mutex<ConnectionConfig>,
    state: Mutex<ConnectionState>,
    socket: Mutex<Option<Arc<dyn SocketHandle>>>,
    state_listeners: Mutex<Vec<(ListenerId, StateListener)>>,
    frame_listeners: Mutex<Vec<(ListenerId, FrameListener)>>,
    next_id: AtomicU64,
    /// Serializes open attempts: a second `connect` while one is in flight
    /// waits for the outcome instead of opening a second socket.
    connect_gate: tokio::sync::Mutex<()>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every successful open and on `force_close`; a reader task
    /// holding a stale generation must not touch manager state.
    generation: AtomicU64,
    closed: AtomicBool,
    last_disconnect: Mutex<Option<DisconnectInfo>>,
    last_error: Mutex<Option<String>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                config: Mutex::new(config),
                state: Mutex::new(ConnectionState::Disconnected),
                socket: Mutex::new(None),
                state_listeners: Mutex::new(Vec::new()),
                frame_listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                connect_gate: tokio::sync::Mutex::new(()),
                reader: Mutex::new(None),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                last_disconnect: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    pub fn config(&self) -> ConnectionConfig {
        self.inner.config.lock().expect("config lock poisoned").clone()
    }

    /// Replaces the configuration wholesale. The live socket, if any, is not
    /// touched; new values apply from the next open attempt.
    pub fn update_config(&self, config: ConnectionConfig) {
        *self.inner.config.lock().expect("config lock poisoned") = config;
    }

    /// Registers a state observer; fires on every transition with the same
    /// per-listener fault isolation the event emitter gives.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = next_listener_id(&self.inner.next_id);
        self.inner
            .state_listeners
            .lock()
            .expect("state listeners lock poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn off_state_change(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .state_listeners
            .lock()
            .expect("state listeners lock poisoned");
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Registers an observer for raw inbound frames.
    pub fn on_frame(&self, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id(&self.inner.next_id);
        self.inner
            .frame_listeners
            .lock()
            .expect("frame listeners lock poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn off_frame(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .frame_listeners
            .lock()
            .expect("frame listeners lock poisoned");
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Opens the socket. Idempotent: while already `Connecting` or
    /// `Connected` this returns the existing handle rather than opening a
    /// second socket, and raises no duplicate `Connecting` transition.
    ///
    /// The attempt is bounded by `connection_timeout_ms`; on timeout or
    /// transport error the manager transitions to `Failed` with the cause
    /// recorded in [`ConnectionManager::last_error`].
    pub async fn connect(&self) -> Result<Arc<dyn SocketHandle>, ConnectionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::ManagerClosed);
        }
        let _gate = self.inner.connect_gate.lock().await;
        if let Some(existing) = self.open_socket() {
            return Ok(existing);
        }

        let (url, timeout_ms) = {
            let config = self.inner.config.lock().expect("config lock poisoned");
            (config.url.clone(), config.connection_timeout_ms)
        };
        self.inner.set_state(ConnectionState::Connecting);

        let attempt = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.inner.transport.open(&url),
        )
        .await;
        match attempt {
            Err(_) => {
                log::warn!("Connection attempt to {} timed out after {} ms", url, timeout_ms);
                self.inner
                    .record_error(format!("connection attempt timed out after {} ms", timeout_ms));
                self.inner.set_state(ConnectionState::Failed);
                Err(ConnectionError::Timeout(timeout_ms))
            }
            Ok(Err(e)) => {
                log::error!("Failed to connect to {}: {}", url, e);
                self.inner.record_error(e.to_string());
                self.inner.set_state(ConnectionState::Failed);
                Err(e.into())
            }
            Ok(Ok((socket, events))) => {
                if self.inner.closed.load(Ordering::SeqCst) {
                    socket.close();
                    return Err(ConnectionError::ManagerClosed);
                }
                *self.inner.socket.lock().expect("socket lock poisoned") =
                    Some(Arc::clone(&socket));
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                self.spawn_reader(events, generation);
                self.inner.set_state(ConnectionState::Connected);
                Ok(socket)
            }
        }
    }

    /// Closes an open socket gracefully and transitions to `Disconnected`.
    pub fn disconnect(&self) {
        if let Some(socket) = self.inner.socket.lock().expect("socket lock poisoned").take() {
            log::info!("Closing status stream socket");
            socket.close();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Teardown: closes the socket, cancels the reader task and clears every
    /// observer so the instance can raise no further events.
    pub fn force_close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(reader) = self.inner.reader.lock().expect("reader lock poisoned").take() {
            reader.abort();
        }
        if let Some(socket) = self.inner.socket.lock().expect("socket lock poisoned").take() {
            socket.close();
        }
        self.inner
            .state_listeners
            .lock()
            .expect("state listeners lock poisoned")
            .clear();
        self.inner
            .frame_listeners
            .lock()
            .expect("frame listeners lock poisoned")
            .clear();
        *self.inner.state.lock().expect("state lock poisoned") = ConnectionState::Disconnected;
    }

    /// Marks the externally-layered `Reconnecting` state. Used by the
    /// coordinator as a visible marker; the manager never enters it itself.
    pub fn set_reconnecting(&self) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        self.inner.set_state(ConnectionState::Reconnecting);
    }

    /// Writes one outbound text frame to the open socket.
    pub fn send_frame(&self, frame: &str) -> Result<(), ConnectionError> {
        let socket = self
            .inner
            .socket
            .lock()
            .expect("socket lock poisoned")
            .clone()
            .ok_or(ConnectionError::NotConnected)?;
        socket.send_text(frame.to_string())?;
        Ok(())
    }

    /// Close metadata from the most recent socket loss, if any.
    pub fn last_disconnect(&self) -> Option<DisconnectInfo> {
        self.inner
            .last_disconnect
            .lock()
            .expect("last disconnect lock poisoned")
            .clone()
    }

    /// Cause of the most recent failed attempt or socket error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .expect("last error lock poisoned")
            .clone()
    }

    fn open_socket(&self) -> Option<Arc<dyn SocketHandle>> {
        if self.state().is_connected() {
            self.inner.socket.lock().expect("socket lock poisoned").clone()
        } else {
            None
        }
    }

    fn spawn_reader(&self, mut events: SocketEvents, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SocketEvent::Frame(frame) => inner.notify_frame(&frame),
                    SocketEvent::Error(error) => {
                        log::error!("Socket error: {}", error);
                        inner.record_error(error);
                    }
                    SocketEvent::Closed { code, reason } => {
                        if inner.generation.load(Ordering::SeqCst) == generation
                            && !inner.closed.load(Ordering::SeqCst)
                        {
                            log::info!("Socket closed (code {:?}) {}", code, reason);
                            *inner
                                .last_disconnect
                                .lock()
                                .expect("last disconnect lock poisoned") =
                                Some(DisconnectInfo { code, reason });
                            inner.socket.lock().expect("socket lock poisoned").take();
                            inner.set_state(ConnectionState::Disconnected);
                        }
                        break;
                    }
                }
            }
        });
        if let Some(previous) = self
            .inner
            .reader
            .lock()
            .expect("reader lock poisoned")
            .replace(handle)
        {
            previous.abort();
        }
    }
}

impl ManagerInner {
    fn record_error(&self, error: String) {
        *self.last_error.lock().expect("last error lock poisoned") = Some(error);
    }

    fn set_state(&self, next: ConnectionState) {
        let change = {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state == next {
                return;
            }
            let change = StateChange {
                previous: *state,
                current: next,
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            *state = next;
            change
        };
        log::debug!("Connection state {:?} -> {:?}", change.previous, change.current);
        let snapshot: Vec<StateListener> = self
            .state_listeners
            .lock()
            .expect("state listeners lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            run_isolated("state-change", || listener(&change));
        }
    }

    fn notify_frame(&self, frame: &str) {
        let snapshot: Vec<FrameListener> = self
            .frame_listeners
            .lock()
            .expect("frame listeners lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            run_isolated("frame", || listener(frame));
        }
    }
}
