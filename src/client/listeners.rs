//! Listener registry keyed by [`EventKind`].
//!
//! Listeners are `Arc` closures compared by allocation, so the same `Arc`
//! used for [`ListenerRegistry::add`] must be passed to
//! [`ListenerRegistry::remove`]. Registration order is invocation order and
//! the same listener may be registered more than once.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::types::event::{EventKind, SyncEvent};

/// Callback invoked for every dispatched event of its kind
pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&SyncEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered listeners per event kind
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: FxHashMap<EventKind, Vec<Listener>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("total", &self.total())
            .finish()
    }
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`
    pub fn add(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Remove every registration of `listener` for `kind`
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, kind: EventKind, listener: &Listener) -> usize {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return 0;
        };
        let before = list.len();
        list.retain(|registered| !same_listener(registered, listener));
        let removed = before - list.len();
        if list.is_empty() {
            self.listeners.remove(&kind);
        }
        removed
    }

    /// Snapshot of the listeners for `kind`, in registration order
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }

    /// Number of listeners registered for `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds
    pub fn total(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}

/// Invoke each listener, isolating panics per listener
///
/// Returns the number of listeners that panicked.
pub fn dispatch(listeners: &[Listener], event: &SyncEvent) -> usize {
    let mut failures = 0;
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            failures += 1;
            tracing::error!(event = %event.kind(), "listener panicked during dispatch");
        }
    }
    failures
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    // Compare data pointers only; vtable pointers are not guaranteed unique
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = hits.clone();
        (
            hits,
            listener(move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_duplicate_registration_fires_twice() {
        let mut registry = ListenerRegistry::new();
        let (hits, l) = counter();
        registry.add(EventKind::Connected, l.clone());
        registry.add(EventKind::Connected, l);

        dispatch(&registry.snapshot(EventKind::Connected), &SyncEvent::Connected);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_by_reference() {
        let mut registry = ListenerRegistry::new();
        let (_, a) = counter();
        let (_, b) = counter();
        registry.add(EventKind::Error, a.clone());
        registry.add(EventKind::Error, b.clone());

        assert_eq!(registry.remove(EventKind::Error, &a), 1);
        assert_eq!(registry.count(EventKind::Error), 1);
        assert_eq!(registry.remove(EventKind::Error, &a), 0);
        assert_eq!(registry.remove(EventKind::Connected, &b), 0);
        assert_eq!(registry.remove(EventKind::Error, &b), 1);
        assert_eq!(registry.total(), 0);
    }

    #[test]
    fn test_invocation_order_matches_registration() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for n in 0..3 {
            let order = order.clone();
            registry.add(EventKind::Connected, listener(move |_| order.lock().push(n)));
        }

        dispatch(&registry.snapshot(EventKind::Connected), &SyncEvent::Connected);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (hits, good) = counter();
        let bad = listener(|_| panic!("broken listener"));

        let failures = dispatch(&[bad, good], &SyncEvent::Connected);
        assert_eq!(failures, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
