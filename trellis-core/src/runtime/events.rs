//! Component event listeners.
//!
//! Each component keeps its own listener table. Subscribing returns an
//! [`Unsubscribe`] handle; listeners are removed by id, so the same closure
//! may be registered more than once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::state::Value;

/// Unique identifier for a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Create an event with no detail.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Event delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub detail: Value,
}

/// Callback registered with `Component::on`.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

type Table = IndexMap<String, SmallVec<[(ListenerId, Listener); 2]>>;

/// Listener table, shared with the `Unsubscribe` handles it gives out.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    table: Arc<Mutex<Table>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, event: &str, listener: Listener) -> Unsubscribe {
        let id = ListenerId::new();
        self.table
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));

        Unsubscribe {
            table: Arc::downgrade(&self.table),
            event: event.to_string(),
            id,
        }
    }

    /// Deliver `event` to a snapshot of its listeners. The table lock is
    /// released before any listener runs.
    pub(crate) fn dispatch(&self, event: &Event) -> usize {
        let listeners: SmallVec<[Listener; 2]> = self
            .table
            .lock()
            .get(&event.name)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub(crate) fn clear(&self) {
        self.table.lock().clear();
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.table.lock().get(event).map_or(0, |e| e.len())
    }
}

/// Removes one listener when `unsubscribe` is called. Dropping the handle
/// leaves the listener registered.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Unsubscribe {
    table: std::sync::Weak<Mutex<Table>>,
    event: String,
    id: ListenerId,
}

impl Unsubscribe {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        if let Some(table) = self.table.upgrade() {
            if let Some(entries) = table.lock().get_mut(&self.event) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn listener_ids_are_unique() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }

    #[test]
    fn dispatch_and_unsubscribe() {
        let listeners = Listeners::default();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = calls.clone();
        let first = listeners.subscribe(
            "select",
            Arc::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let calls_clone = calls.clone();
        let _second = listeners.subscribe(
            "select",
            Arc::new(move |_| {
                calls_clone.fetch_add(10, Ordering::SeqCst);
            }),
        );

        let event = Event {
            name: "select".into(),
            detail: Value::Null,
        };
        assert_eq!(listeners.dispatch(&event), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 11);

        first.unsubscribe();
        assert_eq!(listeners.count("select"), 1);
        listeners.dispatch(&event);
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn listener_may_subscribe_during_dispatch() {
        let listeners = Listeners::default();
        let inner = listeners.clone();
        let _handle = listeners.subscribe(
            "tick",
            Arc::new(move |_| {
                let _ = inner.subscribe("tick", Arc::new(|_| {}));
            }),
        );

        listeners.dispatch(&Event {
            name: "tick".into(),
            detail: Value::Null,
        });
        assert_eq!(listeners.count("tick"), 2);
    }
}
