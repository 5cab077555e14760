//! # Typed Event Emitter
//!
//! Generic publish/subscribe hub used for the client's public event stream.
//! It knows nothing about connections or messages: keys and payloads are
//! type parameters, handlers are plain closures.
//!
//! Handlers for one key run synchronously, in registration order, and a
//! panicking handler is isolated so the remaining handlers still run. There
//! is no buffering: an `emit` with zero listeners is a silent no-op and late
//! subscribers never see earlier events.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque token identifying one listener registration.
///
/// Closures have no identity in Rust, so removal works through the token
/// returned by `on` instead of the handler reference itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Draws a fresh [`ListenerId`] from a per-component counter. Shared by the
/// other observer registries (connection manager, maintenance handler) so
/// their tokens behave exactly like the emitter's.
pub(crate) fn next_listener_id(counter: &AtomicU64) -> ListenerId {
    ListenerId::from_raw(counter.fetch_add(1, Ordering::Relaxed))
}

/// Runs one listener callback, swallowing (and logging) a panic so sibling
/// listeners and the emitting component are unaffected.
pub(crate) fn run_isolated(context: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!(
            "{} listener panicked; continuing with remaining listeners",
            context
        );
    }
}

struct Registration<P> {
    id: ListenerId,
    handler: Arc<dyn Fn(&P) + Send + Sync>,
}

/// Generic typed publish/subscribe hub.
pub struct EventEmitter<K, P> {
    listeners: Mutex<HashMap<K, Vec<Registration<P>>>>,
    next_id: AtomicU64,
}

impl<K, P> Default for EventEmitter<K, P>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> EventEmitter<K, P>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a handler for `key`. Multiple handlers per key are allowed
    /// and keep their insertion order.
    pub fn on(&self, key: K, handler: impl Fn(&P) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().expect("emitter lock poisoned");
        listeners.entry(key).or_default().push(Registration {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes exactly the registration identified by `id`.
    /// Returns `false` when no such registration exists for `key`.
    pub fn off(&self, key: K, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("emitter lock poisoned");
        let Some(entries) = listeners.get_mut(&key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&key);
        }
        removed
    }

    /// Synchronously invokes every currently-registered handler for `key`,
    /// in registration order. Fully drains all listeners before returning.
    pub fn emit(&self, key: K, payload: &P) {
        // Snapshot the handler list so a handler may re-enter the emitter
        // (subscribe/unsubscribe) without deadlocking.
        let snapshot: Vec<Arc<dyn Fn(&P) + Send + Sync>> = {
            let listeners = self.listeners.lock().expect("emitter lock poisoned");
            match listeners.get(&key) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            run_isolated("event", || handler(payload));
        }
    }

    pub fn has_listeners(&self, key: K) -> bool {
        self.listener_count(key) > 0
    }

    pub fn listener_count(&self, key: K) -> usize {
        let listeners = self.listeners.lock().expect("emitter lock poisoned");
        listeners.get(&key).map_or(0, Vec::len)
    }

    /// Keys that currently have at least one listener.
    pub fn event_names(&self) -> Vec<K> {
        let listeners = self.listeners.lock().expect("emitter lock poisoned");
        listeners.keys().copied().collect()
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.listeners
            .lock()
            .expect("emitter lock poisoned")
            .clear();
    }

    /// Drops every registration for one key.
    pub fn clear_event(&self, key: K) {
        self.listeners
            .lock()
            .expect("emitter lock poisoned")
            .remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        A,
        B,
    }

    #[test]
    fn invokes_handlers_in_registration_order() {
        let emitter: EventEmitter<Key, u32> = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            emitter.on(Key::A, move |value| {
                seen.lock().unwrap().push((tag, *value));
            });
        }

        emitter.emit(Key::A, &7);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn off_removes_exactly_one_registration() {
        let emitter: EventEmitter<Key, u32> = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let keep = {
            let calls = Arc::clone(&calls);
            emitter.on(Key::A, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let drop_me = {
            let calls = Arc::clone(&calls);
            emitter.on(Key::A, move |_| {
                calls.fetch_add(100, Ordering::SeqCst);
            })
        };

        assert!(emitter.off(Key::A, drop_me));
        assert!(!emitter.off(Key::A, drop_me));
        emitter.emit(Key::A, &0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(emitter.off(Key::A, keep));
        assert!(!emitter.has_listeners(Key::A));
    }

    #[test]
    fn panicking_handler_does_not_block_siblings() {
        let emitter: EventEmitter<Key, u32> = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        emitter.on(Key::A, |_| panic!("listener exploded"));
        {
            let calls = Arc::clone(&calls);
            emitter.on(Key::A, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        emitter.emit(Key::A, &1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        let emitter: EventEmitter<Key, u32> = EventEmitter::new();
        emitter.emit(Key::B, &42);
    }

    #[test]
    fn introspection_and_clear() {
        let emitter: EventEmitter<Key, u32> = EventEmitter::new();
        emitter.on(Key::A, |_| {});
        emitter.on(Key::A, |_| {});
        emitter.on(Key::B, |_| {});

        assert_eq!(emitter.listener_count(Key::A), 2);
        let mut names = emitter.event_names();
        names.sort_by_key(|k| format!("{k:?}"));
        assert_eq!(names, vec![Key::A, Key::B]);

        emitter.clear_event(Key::A);
        assert!(!emitter.has_listeners(Key::A));
        assert!(emitter.has_listeners(Key::B));

        emitter.clear();
        assert!(emitter.event_names().is_empty());
    }
}
