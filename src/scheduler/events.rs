//! Lifecycle event subscription.
//!
//! A plain registry mapping event kind to an ordered list of callbacks; no
//! trait objects beyond the callbacks themselves and no inheritance-style
//! dispatch. Emission snapshots the list under the scheduler lock and
//! invokes outside it, so a callback may re-enter the scheduler API.

use super::task::TaskId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The event classes a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A task finished successfully.
    TaskComplete,
    /// A task's work failed or panicked.
    TaskError,
    /// A dispatch cycle left no task pending or running.
    QueueEmpty,
}

/// Payload delivered to listeners.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<T> {
    TaskComplete { id: TaskId, result: T },
    TaskError { id: TaskId, error: String },
    QueueEmpty,
}

impl<T> SchedulerEvent<T> {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            SchedulerEvent::TaskComplete { .. } => EventKind::TaskComplete,
            SchedulerEvent::TaskError { .. } => EventKind::TaskError,
            SchedulerEvent::QueueEmpty => EventKind::QueueEmpty,
        }
    }
}

/// Handle returned by `on`, used to unsubscribe with `off`.
///
/// Closures have no identity in Rust, so removal is by handle rather than
/// by the callback itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Callback<T> = Arc<dyn Fn(&SchedulerEvent<T>) + Send + Sync + 'static>;

pub(crate) struct ListenerRegistry<T> {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Callback<T>)>>,
}

impl<T> ListenerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            listeners: HashMap::new(),
        }
    }

    pub(crate) fn on(&mut self, kind: EventKind, callback: Callback<T>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(kind).or_default().push((id, callback));
        id
    }

    pub(crate) fn off(&mut self, kind: EventKind, listener: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != listener);
        entries.len() != before
    }

    /// Registration-ordered callbacks for one event kind.
    pub(crate) fn snapshot(&self, kind: EventKind) -> Vec<Callback<T>> {
        self.listeners
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }
}

impl<T> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .iter()
            .map(|(kind, entries)| (*kind, entries.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn emit_all(registry: &ListenerRegistry<i32>, event: &SchedulerEvent<i32>) {
        for cb in registry.snapshot(event.kind()) {
            cb(event);
        }
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let mut registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 1..=3 {
            let order = Arc::clone(&order);
            registry.on(
                EventKind::QueueEmpty,
                Arc::new(move |_| order.lock().push(tag)),
            );
        }

        emit_all(&registry, &SchedulerEvent::QueueEmpty);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_off_removes_listener() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(0));

        let hits_clone = Arc::clone(&hits);
        let id = registry.on(
            EventKind::TaskComplete,
            Arc::new(move |_| *hits_clone.lock() += 1),
        );

        assert!(registry.off(EventKind::TaskComplete, id));
        emit_all(
            &registry,
            &SchedulerEvent::TaskComplete {
                id: TaskId(1),
                result: 42,
            },
        );
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn test_off_unknown_listener_is_noop() {
        let mut registry: ListenerRegistry<i32> = ListenerRegistry::new();
        let id = registry.on(EventKind::TaskError, Arc::new(|_| {}));

        assert!(!registry.off(EventKind::QueueEmpty, id));
        assert!(registry.off(EventKind::TaskError, id));
        assert!(!registry.off(EventKind::TaskError, id));
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut registry: ListenerRegistry<i32> = ListenerRegistry::new();
        registry.on(EventKind::TaskComplete, Arc::new(|_| {}));

        assert_eq!(registry.snapshot(EventKind::TaskComplete).len(), 1);
        assert!(registry.snapshot(EventKind::TaskError).is_empty());
    }
}
