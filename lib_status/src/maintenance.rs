//! # Maintenance Mode Tracking
//!
//! Maintenance mode is cross-cutting: it arrives both as an explicit
//! directive ("the network IS down for maintenance, show it") and as a flag
//! piggybacked on routine full snapshots. Directives are authoritative and
//! latch *forced mode*: while forced, whatever the snapshots claim is
//! ignored until force mode is explicitly cleared or the state is reset.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::emitter::{next_listener_id, run_isolated, ListenerId};
use crate::parser::{FullSnapshot, MaintenanceDirective};

/// The maintenance flag tuple. Invariant: `force_show_maintenance` implies
/// `is_maintenance` until force mode is cleared or the state is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceState {
    pub is_maintenance: bool,
    /// Unix milliseconds, when the service reported one.
    pub maintenance_start_time: Option<i64>,
    pub force_show_maintenance: bool,
}

type ChangeListener = Arc<dyn Fn(&MaintenanceState) + Send + Sync>;

/// Owns the [`MaintenanceState`] tuple; the only writer of its three fields.
pub struct MaintenanceHandler {
    state: Mutex<MaintenanceState>,
    listeners: Mutex<Vec<(ListenerId, ChangeListener)>>,
    next_id: AtomicU64,
}

impl Default for MaintenanceHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MaintenanceHandler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MaintenanceState::default()),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> MaintenanceState {
        *self.state.lock().expect("maintenance state lock poisoned")
    }

    /// Registers a change listener. Mirrors the event emitter's contract:
    /// a panicking listener is logged and isolated, never rethrown.
    pub fn on_change(&self, listener: impl Fn(&MaintenanceState) + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id(&self.next_id);
        self.listeners
            .lock()
            .expect("maintenance listeners lock poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .expect("maintenance listeners lock poisoned");
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Applies an explicit maintenance directive.
    ///
    /// Directives are authoritative overrides, not passive reports: entering
    /// maintenance this way also latches forced mode, and a `false` directive
    /// clears it.
    pub fn handle_maintenance_message(&self, directive: &MaintenanceDirective) -> MaintenanceState {
        let entering = coerce_status(&directive.status);
        let next = MaintenanceState {
            is_maintenance: entering,
            maintenance_start_time: directive.maintenance_start_time,
            force_show_maintenance: entering,
        };
        self.apply(next)
    }

    /// Adopts the maintenance fields of a routine full snapshot.
    ///
    /// While forced mode is latched the snapshot's claims are ignored and the
    /// forced state is returned unchanged (which also means no notification:
    /// nothing differs).
    pub fn handle_full_message(&self, snapshot: &FullSnapshot) -> MaintenanceState {
        let current = self.state();
        if current.force_show_maintenance {
            return current;
        }
        let next = MaintenanceState {
            is_maintenance: snapshot.is_maintenance.unwrap_or(false),
            maintenance_start_time: snapshot.maintenance_start_time,
            force_show_maintenance: false,
        };
        self.apply(next)
    }

    /// Unconditionally sets both flags. The start time is left untouched;
    /// only directives and snapshots carry one.
    pub fn force_maintenance_mode(&self, enabled: bool) -> MaintenanceState {
        let current = self.state();
        self.apply(MaintenanceState {
            is_maintenance: enabled,
            maintenance_start_time: current.maintenance_start_time,
            force_show_maintenance: enabled,
        })
    }

    /// Back to all-clear defaults.
    pub fn reset(&self) -> MaintenanceState {
        self.apply(MaintenanceState::default())
    }

    /// Stores `next` and notifies listeners, but only when the tuple actually
    /// changed: repeated identical snapshots must not spam listeners.
    fn apply(&self, next: MaintenanceState) -> MaintenanceState {
        {
            let mut state = self.state.lock().expect("maintenance state lock poisoned");
            if *state == next {
                return next;
            }
            log::debug!("Maintenance state {:?} -> {:?}", *state, next);
            *state = next;
        }
        let snapshot: Vec<ChangeListener> = self
            .listeners
            .lock()
            .expect("maintenance listeners lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            run_isolated("maintenance", || listener(&next));
        }
        next
    }
}

/// The service has historically sent `status` as a boolean or as the strings
/// `"true"`/`"false"`; anything else reads as "not in maintenance".
fn coerce_status(status: &Value) -> bool {
    match status {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}
