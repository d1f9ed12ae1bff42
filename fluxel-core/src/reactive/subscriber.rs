//! Subscriber types for the reactive system.
//!
//! A listener is any callback that wants to hear about a value change: a DOM
//! patch installed by the node builder, a child reconciler, or user code.
//! Registering one hands back a [`Subscription`] that can tear it down again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Each registered listener gets a unique ID. The ID is what a
/// [`Subscription`] uses to find and remove its listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

type Teardown = Box<dyn FnOnce() + Send + Sync>;

/// Handle to a registered listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it. The node builder hands every
/// subscription it creates to the document's lifecycle store, which
/// unsubscribes them when the owning node is detached.
pub struct Subscription {
    id: SubscriberId,
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when unsubscribed.
    pub fn new<F>(id: SubscriberId, teardown: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            id: SubscriberId::new(),
            teardown: None,
        }
    }

    /// Combine several subscriptions into one that tears all of them down.
    pub fn merge(parts: Vec<Subscription>) -> Self {
        Self::new(SubscriberId::new(), move || {
            for part in parts {
                part.unsubscribe();
            }
        })
    }

    /// Get the subscription's ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the listener.
    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Turn the subscription into a plain cleanup callback.
    pub(crate) fn into_cleanup(self) -> Teardown {
        Box::new(move || self.unsubscribe())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

/// Ordered listener registry for one observable value.
///
/// Listeners fire in insertion order. Adding the same [`Listener`] (by
/// pointer) twice keeps the first registration.
#[derive(Default, Clone)]
pub struct ListenerList {
    entries: SmallVec<[(SubscriberId, Listener); 4]>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, returning its ID.
    ///
    /// A listener that is already registered returns its existing ID.
    pub fn add(&mut self, listener: Listener) -> SubscriberId {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(existing, &listener))
        {
            return *id;
        }

        let id = SubscriberId::new();
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener by ID. Returns whether it was present.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Copy the current listeners out so they can run without holding
    /// whatever lock guards this list.
    pub fn snapshot(&self) -> SmallVec<[Listener; 4]> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Invoke every listener in order.
pub(crate) fn notify_all<I>(listeners: I)
where
    I: IntoIterator<Item = Listener>,
{
    for notify in listeners {
        notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn duplicate_listeners_are_suppressed() {
        let mut list = ListenerList::new();
        let l = listener(|| {});

        let first = list.add(l.clone());
        let second = list.add(l);
        assert_eq!(first, second);
        assert_eq!(list.len(), 1);

        list.add(listener(|| {}));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn listeners_fire_in_insertion_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut list = ListenerList::new();
        for i in 0..3 {
            let order = order.clone();
            list.add(listener(move || order.lock().push(i)));
        }

        notify_all(list.snapshot());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn unsubscribe_runs_teardown_once() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let sub = Subscription::new(SubscriberId::new(), move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        sub.unsubscribe();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn merged_subscription_tears_down_every_part() {
        let count = Arc::new(AtomicI32::new(0));
        let parts = (0..3)
            .map(|_| {
                let count = count.clone();
                Subscription::new(SubscriberId::new(), move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        Subscription::merge(parts).unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
