//! Cell Implementation
//!
//! A Cell is the smallest observable value: a get/set pair plus a listener
//! registry. Setting a cell notifies every registered listener in
//! registration order.
//!
//! State containers keep their own slots and route writes through the
//! container (so change events and equality checks apply), but a standalone
//! `Cell` is the quickest way to get a writable [`Dependency`].
//!
//! # Thread Safety
//!
//! The value sits behind a `parking_lot::RwLock`. Listeners are copied out
//! of their registry before they run, so a listener may freely read or
//! write the cell that notified it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::dependency::Dependency;
use super::subscriber::{notify_all, Listener, ListenerList, Subscription};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An observable value of type `T`.
///
/// ```rust,ignore
/// let count = Cell::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: u64,
    value: Arc<RwLock<T>>,
    listeners: Arc<Mutex<ListenerList>>,
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_cell_id(),
            value: Arc::new(RwLock::new(value)),
            listeners: Arc::new(Mutex::new(ListenerList::new())),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify listeners.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notify();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(next);
    }

    /// Register a listener that runs after every `set`.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.listeners.lock().add(listener);
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(id, move || {
            listeners.lock().remove(id);
        })
    }

    /// Get the number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// A writable dependency backed by this cell.
    pub fn dependency(&self) -> Dependency<T> {
        let getter = self.clone();
        let setter = self.clone();
        let registrar = self.clone();
        Dependency::from_fns(
            move || Ok(getter.get()),
            move |value| {
                setter.set(value);
                Ok(())
            },
            move |listener| registrar.subscribe(listener),
        )
    }

    fn notify(&self) {
        let snapshot = self.listeners.lock().snapshot();
        tracing::trace!(cell = self.id, listeners = snapshot.len(), "cell changed");
        notify_all(snapshot);
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
