//! State Container
//!
//! A [`State`] is a set of named slots holding JSON values. Reading a slot
//! returns the raw value; the reactive view of a slot is created on demand
//! by [`State::use_key`] and cached for the container's lifetime.
//!
//! # Writes
//!
//! 1. Reserved keys (`render`, `use`, `useWithMemo`, `listenTarget`) are
//!    rejected.
//! 2. Writing a value equal to the current one does nothing: no event, no
//!    listener.
//! 3. Otherwise the slot is updated, a [`StateEvent::Change`] is dispatched
//!    on the container's [`ListenTarget`], and [`State::render`] runs the
//!    key's listeners in registration order.
//!
//! # Composite dependencies
//!
//! [`State::use_keys`] observes several keys at once. Its listeners are
//! coalesced through the container's [`TaskQueue`], so any number of writes
//! before the next tick trigger one recomputation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::error::{FluxelError, Result};

use super::dependency::Dependency;
use super::events::{ListenTarget, StateEvent, RENDER_EVENT};
use super::memo::Memo;
use super::scheduler::{coalesce, TaskHandle, TaskQueue};
use super::subscriber::{notify_all, Listener, ListenerList, SubscriberId, Subscription};

/// Keys that belong to the container's own surface.
pub const RESERVED_KEYS: [&str; 4] = ["render", "use", "useWithMemo", "listenTarget"];

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

struct StateInner {
    slots: RwLock<IndexMap<String, Value>>,
    /// Listener registry per key, created the first time a key is used.
    listeners: Mutex<IndexMap<String, ListenerList>>,
    deps: Mutex<HashMap<String, Dependency<Value>>>,
    target: ListenTarget,
    queue: TaskQueue,
}

/// Observable record of named JSON slots. Clones share the container.
#[derive(Clone)]
pub struct State {
    inner: Arc<StateInner>,
}

impl State {
    /// Create a container from a JSON object (or `null` for an empty one).
    pub fn new(initial: Value, queue: TaskQueue) -> Result<Self> {
        let slots = match initial {
            Value::Null => IndexMap::new(),
            Value::Object(map) => map.into_iter().collect::<IndexMap<_, _>>(),
            other => return Err(FluxelError::InvalidInitialState(json_kind(&other))),
        };

        if let Some(key) = slots.keys().find(|k| is_reserved(k)) {
            return Err(FluxelError::ReservedKey(key.clone()));
        }

        Ok(Self {
            inner: Arc::new(StateInner {
                slots: RwLock::new(slots),
                listeners: Mutex::new(IndexMap::new()),
                deps: Mutex::new(HashMap::new()),
                target: ListenTarget::new(),
                queue,
            }),
        })
    }

    /// Current raw value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.slots.read().get(key).cloned()
    }

    /// Write `key`. See the module docs for the exact sequence.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        write_slot(&self.inner, key, value.into())
    }

    /// Write `key` with a function of its current value.
    pub fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.get(key).unwrap_or(Value::Null);
        self.set(key, f(&current))
    }

    /// Slot names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.slots.read().keys().cloned().collect()
    }

    /// Run the listeners for `key`, or for every used key when `None`.
    pub fn render(&self, key: Option<&str>) {
        render_inner(&self.inner, key);
    }

    /// The reactive view of `key`, created on first use.
    pub fn use_key(&self, key: &str) -> Dependency<Value> {
        let mut deps = self.inner.deps.lock();
        if let Some(dep) = deps.get(key) {
            return dep.clone();
        }

        self.inner
            .listeners
            .lock()
            .entry(key.to_string())
            .or_default();

        let dep = slot_dependency(Arc::downgrade(&self.inner), key);
        deps.insert(key.to_string(), dep.clone());
        dep
    }

    /// A read-only derivation of `key` with memo support.
    pub fn use_derived<U, F>(&self, key: &str, f: F) -> Dependency<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&Value, &Memo) -> U + Send + Sync + 'static,
    {
        self.use_key(key).derive_with_memo(f)
    }

    /// A read-only derivation over several keys.
    ///
    /// The derive function receives the keys' current values as an object.
    /// Listeners run on the next tick of the container's queue, once per
    /// tick no matter how many of the keys changed.
    pub fn use_keys<U, F>(&self, keys: &[&str], f: F) -> Dependency<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&Map<String, Value>, &Memo) -> U + Send + Sync + 'static,
    {
        let entries: Vec<(String, Dependency<Value>)> = keys
            .iter()
            .map(|k| (k.to_string(), self.use_key(k)))
            .collect();
        let entries = Arc::new(entries);

        let read = Arc::clone(&entries);
        let watch = Arc::clone(&entries);
        let queue = self.inner.queue.clone();

        let composite = Dependency::from_fns(
            move || {
                let mut values = Map::new();
                for (key, dep) in read.iter() {
                    values.insert(key.clone(), dep.get()?);
                }
                Ok(values)
            },
            |_| Err(FluxelError::composite_read_only()),
            move |listener: Listener| {
                let coalesced = coalesce(&queue, listener);
                let parts: Vec<Subscription> = watch
                    .iter()
                    .map(|(_, dep)| dep.subscribe(coalesced.trigger()))
                    .collect();
                Subscription::new(SubscriberId::new(), move || {
                    coalesced.cancel();
                    for part in parts {
                        part.unsubscribe();
                    }
                })
            },
        );

        composite
            .derive_with_memo(f)
            .with_setter(|_| Err(FluxelError::composite_read_only()))
    }

    /// The reactive view of `key` plus the memo table its derivation uses.
    ///
    /// One derivation pass runs immediately so the table is initialised
    /// with a zero positional call count.
    pub fn use_with_memo(&self, key: &str) -> (Dependency<Value>, Memo) {
        let memo = Memo::new();
        let dep = self
            .use_key(key)
            .derive_memoized(memo.clone(), |value, _| value.clone());

        if let Err(err) = dep.get() {
            tracing::error!(key, error = %err, "initial memo pass failed");
        }
        (dep, memo)
    }

    /// The container's event target.
    pub fn listen_target(&self) -> &ListenTarget {
        &self.inner.target
    }

    /// The queue composite dependencies defer to.
    pub fn queue(&self) -> &TaskQueue {
        &self.inner.queue
    }

    /// Defer `f` to the next tick of the container's queue.
    pub fn schedule<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.schedule(f)
    }

    /// Number of listeners registered for `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(key)
            .map_or(0, ListenerList::len)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("slots", &*self.inner.slots.read())
            .field("target", &self.inner.target)
            .finish()
    }
}

/// Create a container and hand it to `renderer`.
pub fn reactive<R, F>(initial: Value, queue: TaskQueue, renderer: F) -> Result<R>
where
    F: FnOnce(&State) -> R,
{
    let state = State::new(initial, queue)?;
    Ok(renderer(&state))
}

fn write_slot(inner: &StateInner, key: &str, value: Value) -> Result<()> {
    if is_reserved(key) {
        return Err(FluxelError::ReservedKey(key.to_string()));
    }

    let old = {
        let mut slots = inner.slots.write();
        match slots.get_mut(key) {
            Some(current) if *current == value => return Ok(()),
            Some(current) => std::mem::replace(current, value.clone()),
            // A missing key already reads as null.
            None if value.is_null() => return Ok(()),
            None => {
                slots.insert(key.to_string(), value.clone());
                Value::Null
            }
        }
    };

    inner.target.dispatch(
        key,
        &StateEvent::Change {
            key: key.to_string(),
            old,
            new: value,
        },
    );
    render_inner(inner, Some(key));
    Ok(())
}

fn render_inner(inner: &StateInner, key: Option<&str>) {
    inner.target.dispatch(
        RENDER_EVENT,
        &StateEvent::Render {
            key: key.map(str::to_string),
        },
    );

    let snapshot: Vec<Listener> = {
        let listeners = inner.listeners.lock();
        match key {
            Some(key) => listeners
                .get(key)
                .map(|l| l.snapshot().into_vec())
                .unwrap_or_default(),
            None => listeners.values().flat_map(|l| l.snapshot()).collect(),
        }
    };

    tracing::trace!(key, listeners = snapshot.len(), "state render");
    notify_all(snapshot);
}

/// Cell-backed dependency for one slot. Holds the container weakly so the
/// cached dependency does not keep its own container alive.
fn slot_dependency(inner: Weak<StateInner>, key: &str) -> Dependency<Value> {
    let get_inner = inner.clone();
    let get_key = key.to_string();
    let set_inner = inner.clone();
    let set_key = key.to_string();
    let reg_key = key.to_string();

    Dependency::from_fns(
        move || {
            Ok(get_inner
                .upgrade()
                .and_then(|inner| inner.slots.read().get(&get_key).cloned())
                .unwrap_or(Value::Null))
        },
        move |value| match set_inner.upgrade() {
            Some(inner) => write_slot(&inner, &set_key, value),
            None => Ok(()),
        },
        move |listener| {
            let Some(strong) = inner.upgrade() else {
                return Subscription::empty();
            };
            let id = strong
                .listeners
                .lock()
                .entry(reg_key.clone())
                .or_default()
                .add(listener);

            let weak = inner.clone();
            let key = reg_key.clone();
            Subscription::new(id, move || {
                if let Some(inner) = weak.upgrade() {
                    if let Some(list) = inner.listeners.lock().get_mut(&key) {
                        list.remove(id);
                    }
                }
            })
        },
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
