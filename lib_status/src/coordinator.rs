//! # Event Coordinator
//!
//! The integration point: listens to connection-manager state changes and
//! maintenance-handler changes, drives the reconnect policy and translates
//! low-level state into the public event stream.
//!
//! The coordinator owns the only two pieces of scheduled work in the client
//! besides the connect timeout: a single cancellable retry timer, and the
//! caller-supplied async connect function it invokes when that timer fires.
//! Like the manager it is a cheap clone over shared inner state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionManager, ConnectionState, StateChange};
use crate::emitter::EventEmitter;
use crate::events::{ClientEvent, EventName};
use crate::maintenance::MaintenanceHandler;
use crate::reconnect::{ReconnectConfigUpdate, ReconnectProgress, ReconnectStrategy};

/// Caller-supplied zero-argument async connect function, invoked on retry.
pub type ConnectFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
pub struct EventCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    emitter: Arc<EventEmitter<EventName, ClientEvent>>,
    manager: ConnectionManager,
    strategy: Mutex<ReconnectStrategy>,
    connect_fn: Mutex<Option<ConnectFn>>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    /// Terminal failure is reported exactly once until reset/reconfiguration.
    failure_reported: AtomicBool,
}

impl EventCoordinator {
    /// Builds the coordinator and wires it into the manager's state stream
    /// and the maintenance handler's change stream.
    pub fn new(
        emitter: Arc<EventEmitter<EventName, ClientEvent>>,
        manager: ConnectionManager,
        maintenance: Arc<MaintenanceHandler>,
        config: &ConnectionConfig,
        connect_fn: ConnectFn,
    ) -> Self {
        let coordinator = Self {
            inner: Arc::new(CoordinatorInner {
                emitter,
                manager: manager.clone(),
                strategy: Mutex::new(ReconnectStrategy::new(config)),
                connect_fn: Mutex::new(Some(connect_fn)),
                retry_task: Mutex::new(None),
                failure_reported: AtomicBool::new(false),
            }),
        };

        {
            let coordinator = coordinator.clone();
            manager.on_state_change(move |change| coordinator.handle_state_change(change));
        }
        {
            let coordinator = coordinator.clone();
            maintenance.on_change(move |state| {
                coordinator.emit(ClientEvent::MaintenanceUpdate(*state));
            });
        }

        coordinator
    }

    /// Stops reconnection scheduling at runtime. The attempt counter is kept.
    pub fn disable_reconnect(&self) {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .set_disabled(true);
    }

    /// Re-enables reconnection scheduling. The attempt counter is kept.
    pub fn enable_reconnect(&self) {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .set_disabled(false);
    }

    /// Resets the retry budget and the terminal-failure latch.
    pub fn reset(&self) {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .reset();
        self.inner.failure_reported.store(false, Ordering::SeqCst);
    }

    pub fn progress(&self) -> ReconnectProgress {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .progress()
    }

    pub fn estimated_total_reconnect_time(&self) -> u64 {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .estimated_total_reconnect_time()
    }

    /// Merges new policy settings; reopens the terminal-failure latch so a
    /// raised budget can take effect.
    pub fn update_reconnect_config(&self, update: ReconnectConfigUpdate) {
        self.inner
            .strategy
            .lock()
            .expect("strategy lock poisoned")
            .update_config(update);
        self.inner.failure_reported.store(false, Ordering::SeqCst);
    }

    /// Teardown: disables reconnection, cancels any pending retry timer and
    /// detaches the connect function so an in-flight timer becomes a no-op.
    pub fn cleanup(&self) {
        self.disable_reconnect();
        self.inner
            .connect_fn
            .lock()
            .expect("connect_fn lock poisoned")
            .take();
        if let Some(task) = self
            .inner
            .retry_task
            .lock()
            .expect("retry task lock poisoned")
            .take()
        {
            task.abort();
        }
    }

    fn handle_state_change(&self, change: &StateChange) {
        match change.current {
            ConnectionState::Connected => {
                self.inner
                    .strategy
                    .lock()
                    .expect("strategy lock poisoned")
                    .reset();
                self.inner.failure_reported.store(false, Ordering::SeqCst);
                self.emit(ClientEvent::Connected);
            }
            ConnectionState::Disconnected if was_active(change.previous) => {
                let info = self.inner.manager.last_disconnect().unwrap_or_default();
                self.emit(ClientEvent::Disconnected {
                    code: info.code,
                    reason: info.reason,
                });
                self.consider_reconnect();
            }
            ConnectionState::Failed if was_active(change.previous) => {
                let cause = self
                    .inner
                    .manager
                    .last_error()
                    .unwrap_or_else(|| "connection attempt failed".to_string());
                self.emit(ClientEvent::Error { cause });
                self.consider_reconnect();
            }
            _ => {}
        }
    }

    /// Schedules a single retry, or latches terminal failure when the budget
    /// is spent. A disabled policy does neither.
    fn consider_reconnect(&self) {
        let (delay_ms, attempt, max_attempts) = {
            let mut strategy = self.inner.strategy.lock().expect("strategy lock poisoned");
            if !strategy.is_enabled() {
                return;
            }
            if !strategy.should_reconnect() {
                let max_attempts = strategy.max_attempts();
                let total_attempts = strategy.current_attempts();
                drop(strategy);
                if !self.inner.failure_reported.swap(true, Ordering::SeqCst) {
                    log::warn!(
                        "Reconnect budget exhausted after {} attempts; giving up",
                        total_attempts
                    );
                    self.emit(ClientEvent::ConnectionFailed {
                        max_attempts,
                        total_attempts,
                    });
                }
                return;
            }
            let delay_ms = strategy.get_next_delay();
            let attempt = strategy.increment_attempts();
            (delay_ms, attempt, strategy.max_attempts())
        };

        log::info!(
            "Scheduling reconnect attempt {}/{} in {} ms",
            attempt,
            max_attempts,
            delay_ms
        );
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if !coordinator
                .inner
                .strategy
                .lock()
                .expect("strategy lock poisoned")
                .is_enabled()
            {
                return;
            }
            let connect = {
                let connect_fn = coordinator
                    .inner
                    .connect_fn
                    .lock()
                    .expect("connect_fn lock poisoned");
                match connect_fn.as_ref() {
                    Some(connect) => Arc::clone(connect),
                    None => return,
                }
            };
            coordinator.inner.manager.set_reconnecting();
            coordinator.emit(ClientEvent::Reconnecting {
                attempt,
                delay_ms,
                max_attempts,
            });
            connect().await;
        });
        if let Some(previous) = self
            .inner
            .retry_task
            .lock()
            .expect("retry task lock poisoned")
            .replace(handle)
        {
            previous.abort();
        }
    }

    fn emit(&self, event: ClientEvent) {
        self.inner.emitter.emit(event.name(), &event);
    }
}

/// States from which a drop is worth reporting: the client either had a
/// connection or was trying to get one.
fn was_active(state: ConnectionState) -> bool {
    matches!(
        state,
        ConnectionState::Connected | ConnectionState::Connecting | ConnectionState::Reconnecting
    )
}
