//! State change events.
//!
//! Every state container owns one [`ListenTarget`]. Writes dispatch a
//! [`StateEvent::Change`] under the property name; every render pass
//! dispatches a [`StateEvent::Render`] under [`RENDER_EVENT`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;

/// Event name used for render notifications.
pub const RENDER_EVENT: &str = "render";

/// Payload of a state event.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// A property changed.
    Change { key: String, old: Value, new: Value },
    /// Listeners for `key` (or for every key when `None`) are about to run.
    Render { key: Option<String> },
}

/// Identifier returned by [`ListenTarget::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler = Arc<dyn Fn(&StateEvent) + Send + Sync>;

/// Event target scoped to a single state container.
#[derive(Clone, Default)]
pub struct ListenTarget {
    handlers: Arc<Mutex<IndexMap<String, SmallVec<[(ListenerId, Handler); 2]>>>>,
}

impl ListenTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for `event` (a property name or [`RENDER_EVENT`]).
    pub fn add_event_listener<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Deliver `payload` to every handler registered for `event`.
    pub fn dispatch(&self, event: &str, payload: &StateEvent) {
        let snapshot: SmallVec<[Handler; 2]> = match self.handlers.lock().get(event) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        };
        for handler in snapshot {
            handler(payload);
        }
    }

    /// Number of handlers registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, |l| l.len())
    }
}

impl fmt::Debug for ListenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock();
        f.debug_map()
            .entries(handlers.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_reaches_only_matching_handlers() {
        let target = ListenTarget::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        target.add_event_listener("count", move |event| {
            seen_clone.lock().push(event.clone());
        });
        target.add_event_listener("other", |_| panic!("wrong event"));

        let event = StateEvent::Change {
            key: "count".into(),
            old: json!(0),
            new: json!(1),
        };
        target.dispatch("count", &event);

        assert_eq!(*seen.lock(), vec![event]);
    }

    #[test]
    fn removed_handler_stops_receiving() {
        let target = ListenTarget::new();
        let id = target.add_event_listener(RENDER_EVENT, |_| panic!("removed"));

        assert_eq!(target.listener_count(RENDER_EVENT), 1);
        assert!(target.remove_event_listener(RENDER_EVENT, id));
        assert!(!target.remove_event_listener(RENDER_EVENT, id));

        target.dispatch(RENDER_EVENT, &StateEvent::Render { key: None });
    }
}
