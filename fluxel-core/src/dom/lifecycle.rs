//! Listener Lifecycle Store
//!
//! Associates a node with the cleanup callbacks of the reactive
//! subscriptions that patch it. When the reconciler detaches a node, the
//! document walks the node and its descendants, runs every cleanup it finds
//! here and drops the entries, so update callbacks stop firing against
//! detached nodes and the listener registries do not grow without bound.
//!
//! Entries are keyed by [`NodeId`] and never keep a node alive; a node that
//! is never cleaned up simply leaves its entry behind.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::reactive::Subscription;

use super::node::NodeId;

/// A zero-argument teardown callback.
pub type Cleanup = Box<dyn FnOnce() + Send + Sync>;

type Entries = Mutex<HashMap<NodeId, Vec<Cleanup>>>;

/// Node to cleanup-callback association. Clones share the store.
#[derive(Clone, Default)]
pub struct LifecycleStore {
    entries: Arc<Entries>,
}

/// Non-owning handle to a [`LifecycleStore`].
#[derive(Clone)]
pub(crate) struct WeakLifecycle(Weak<Entries>);

impl WeakLifecycle {
    pub(crate) fn upgrade(&self) -> Option<LifecycleStore> {
        self.0.upgrade().map(|entries| LifecycleStore { entries })
    }
}

impl LifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakLifecycle {
        WeakLifecycle(Arc::downgrade(&self.entries))
    }

    /// Attach a cleanup callback to `node`.
    pub fn register<F>(&self, node: NodeId, cleanup: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.entries
            .lock()
            .entry(node)
            .or_default()
            .push(Box::new(cleanup));
    }

    /// Attach a subscription to `node`; cleanup unsubscribes it.
    pub fn register_subscription(&self, node: NodeId, subscription: Subscription) {
        self.entries
            .lock()
            .entry(node)
            .or_default()
            .push(subscription.into_cleanup());
    }

    /// Remove and return every cleanup registered for `nodes`.
    pub(crate) fn take(&self, nodes: &[NodeId]) -> Vec<Cleanup> {
        let mut entries = self.entries.lock();
        nodes
            .iter()
            .filter_map(|node| entries.remove(node))
            .flatten()
            .collect()
    }

    /// Number of cleanups registered for `node`.
    pub fn registered(&self, node: NodeId) -> usize {
        self.entries.lock().get(&node).map_or(0, Vec::len)
    }

    /// Whether any cleanup is registered for `node`.
    pub fn has_entries(&self, node: NodeId) -> bool {
        self.entries.lock().contains_key(&node)
    }

    /// Total number of registered cleanups.
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for LifecycleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleStore")
            .field("nodes", &self.entries.lock().len())
            .field("cleanups", &self.len())
            .finish()
    }
}
