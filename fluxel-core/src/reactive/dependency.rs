//! Reactive Dependency
//!
//! A [`Dependency`] pairs an accessor (get/set) with a registration
//! function. Anything that wants to react to the value registers a
//! listener through [`Dependency::subscribe`]; the dependency never pushes
//! values, it only says "this may have changed, read me again".
//!
//! Deriving produces a read-only dependency whose accessor applies a
//! function to the base value on every read and whose registration forwards
//! to the base, so change notifications flow through any chain of
//! derivations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{FluxelError, Result};

use super::memo::Memo;
use super::subscriber::{listener, Listener, Subscription};

static DEPENDENCY_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_dependency_id() -> u64 {
    DEPENDENCY_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Getter<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(T) -> Result<()> + Send + Sync>;
type Registrar = Arc<dyn Fn(Listener) -> Subscription + Send + Sync>;

/// An observable value plus a way to be told when it may have changed.
pub struct Dependency<T> {
    id: u64,
    getter: Getter<T>,
    setter: Setter<T>,
    registrar: Registrar,
}

impl<T> Dependency<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build a dependency from raw accessor and registration functions.
    pub fn from_fns<G, S, R>(get: G, set: S, register: R) -> Self
    where
        G: Fn() -> Result<T> + Send + Sync + 'static,
        S: Fn(T) -> Result<()> + Send + Sync + 'static,
        R: Fn(Listener) -> Subscription + Send + Sync + 'static,
    {
        Self {
            id: next_dependency_id(),
            getter: Arc::new(get),
            setter: Arc::new(set),
            registrar: Arc::new(register),
        }
    }

    /// A dependency that never changes.
    ///
    /// Useful wherever a reactive slot is expected but the value is fixed.
    pub fn constant(value: T) -> Self {
        Self::from_fns(
            move || Ok(value.clone()),
            |_| Err(FluxelError::derived_read_only()),
            |_| Subscription::empty(),
        )
    }

    /// Get the dependency's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read the current value.
    ///
    /// Derived dependencies recompute on every read.
    pub fn get(&self) -> Result<T> {
        (self.getter)()
    }

    /// Write a new value. Fails for derived and composite dependencies.
    pub fn set(&self, value: T) -> Result<()> {
        (self.setter)(value)
    }

    /// Register a listener that fires whenever the value may have changed.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        (self.registrar)(listener)
    }

    /// Closure form of [`Dependency::subscribe`].
    pub fn on_change<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(listener(f))
    }

    /// Derive a read-only dependency computing `f(base)` on each read.
    pub fn derive<U, F>(&self, f: F) -> Dependency<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let base = Arc::clone(&self.getter);
        Dependency {
            id: next_dependency_id(),
            getter: Arc::new(move || base().map(|value| f(&value))),
            setter: Arc::new(|_| Err(FluxelError::derived_read_only())),
            registrar: Arc::clone(&self.registrar),
        }
    }

    /// Derive with access to a [`Memo`] table that persists across reads.
    ///
    /// Every read is one memo pass; a pass that makes a different number of
    /// positional memo calls than the first one fails the read.
    pub fn derive_with_memo<U, F>(&self, f: F) -> Dependency<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T, &Memo) -> U + Send + Sync + 'static,
    {
        self.derive_memoized(Memo::new(), f)
    }

    pub(crate) fn derive_memoized<U, F>(&self, memo: Memo, f: F) -> Dependency<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T, &Memo) -> U + Send + Sync + 'static,
    {
        let base = Arc::clone(&self.getter);
        Dependency {
            id: next_dependency_id(),
            getter: Arc::new(move || {
                let value = base()?;
                memo.begin_pass();
                let derived = f(&value, &memo);
                memo.end_pass()?;
                Ok(derived)
            }),
            setter: Arc::new(|_| Err(FluxelError::derived_read_only())),
            registrar: Arc::clone(&self.registrar),
        }
    }

    /// Replace the setter, keeping accessor and registration.
    pub(crate) fn with_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Arc::new(set);
        self
    }
}

impl<T> Clone for Dependency<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            getter: Arc::clone(&self.getter),
            setter: Arc::clone(&self.setter),
            registrar: Arc::clone(&self.registrar),
        }
    }
}

impl<T> fmt::Debug for Dependency<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency").field("id", &self.id).finish()
    }
}
