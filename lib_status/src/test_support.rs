//! Scripted transport for exercising the connection stack without sockets.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{SocketEvent, SocketEvents, SocketHandle, Transport, TransportError};

/// What the next `open` call should do.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Hand out a working socket.
    Open,
    /// Fail immediately with the given reason.
    Fail(&'static str),
    /// Never resolve (drives the connect-timeout path).
    Hang,
}

pub struct MockSocket {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockSocket {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SocketHandle for MockSocket {
    fn send_text(&self, frame: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Transport whose `open` outcomes are scripted up front. Once the script is
/// exhausted every further open uses the default outcome.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    default_outcome: MockOutcome,
    opens: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<SocketEvent>>>,
    last_socket: Mutex<Option<Arc<MockSocket>>>,
}

impl MockTransport {
    pub fn new(outcomes: Vec<MockOutcome>) -> Arc<Self> {
        Self::with_default(outcomes, MockOutcome::Open)
    }

    /// Every open succeeds.
    pub fn always_open() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Every open fails.
    pub fn always_failing() -> Arc<Self> {
        Self::with_default(Vec::new(), MockOutcome::Fail("connection refused"))
    }

    pub fn with_default(outcomes: Vec<MockOutcome>, default_outcome: MockOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            default_outcome,
            opens: AtomicUsize::new(0),
            events: Mutex::new(None),
            last_socket: Mutex::new(None),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Pushes a socket event into the most recently opened socket's stream.
    pub fn push_event(&self, event: SocketEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn last_socket(&self) -> Option<Arc<MockSocket>> {
        self.last_socket.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        _url: &str,
    ) -> Result<(Arc<dyn SocketHandle>, SocketEvents), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.clone());
        match outcome {
            MockOutcome::Open => {
                let (tx, rx) = mpsc::unbounded_channel();
                let socket = Arc::new(MockSocket {
                    sent: Mutex::new(Vec::new()),
                    closed: AtomicBool::new(false),
                });
                *self.events.lock().unwrap() = Some(tx);
                *self.last_socket.lock().unwrap() = Some(Arc::clone(&socket));
                Ok((socket, rx))
            }
            MockOutcome::Fail(reason) => Err(TransportError::Open(reason.to_string())),
            MockOutcome::Hang => std::future::pending().await,
        }
    }
}
