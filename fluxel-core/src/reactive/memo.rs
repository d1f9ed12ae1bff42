//! Memo Implementation
//!
//! A [`Memo`] is the scratch space handed to a derive function on every
//! evaluation. It offers two caching strategies:
//!
//! 1. **Positional** (`pure = false`): the n-th `memoize` call of a pass
//!    owns slot n. The slot's cached value is reused when the new dependency
//!    array equals the previous one element by element; otherwise the
//!    factory reruns and the slot is overwritten.
//!
//! 2. **Pure** (`pure = true`): the cache key is the serialized dependency
//!    array, independent of call order. Keys used during a pass survive into
//!    the next pass; keys not used are dropped when the pass ends, which
//!    keeps the table bounded to values that are still relevant.
//!
//! # Invariant
//!
//! After the first pass, every pass must make the same number of positional
//! calls. A different count means `memoize` was called conditionally, so
//! [`Memo::end_pass`] fails with [`FluxelError::MemoCountMismatch`]. Extra
//! calls in such a pass run their factory uncached rather than growing the
//! slot table.
//!
//! # Reentrancy
//!
//! The table lock is released while factories run, so a factory may call
//! `memoize` again (or read other dependencies) without deadlocking.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{FluxelError, Result};

type Cached = Arc<dyn Any + Send + Sync>;

/// One positional slot.
struct Slot {
    deps: Vec<Value>,
    /// `None` while the factory that will fill it is still running.
    value: Option<Cached>,
}

#[derive(Default)]
struct MemoTable {
    slots: Vec<Slot>,
    /// Next positional slot.
    index: usize,
    /// Positional call count of the first pass.
    expected: Option<usize>,
    in_pass: bool,
    passes: usize,
    /// Pure entries carried over from the previous pass.
    pure: HashMap<String, Cached>,
    /// Pure entries touched during the current pass.
    used_pure: HashMap<String, Cached>,
}

/// Memoization handle passed to derive functions.
///
/// Cloning the handle shares the table.
#[derive(Clone, Default)]
pub struct Memo {
    table: Arc<Mutex<MemoTable>>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional memoization: reuse the value cached in this call's slot
    /// while `deps` is unchanged.
    pub fn memo<T, F>(&self, factory: F, deps: &[Value]) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.memoize(factory, deps, false)
    }

    /// Pure memoization keyed by the content of `deps`.
    pub fn memo_pure<T, F>(&self, factory: F, deps: &[Value]) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.memoize(factory, deps, true)
    }

    /// Memoize `factory` against `deps` with the chosen strategy.
    pub fn memoize<T, F>(&self, factory: F, deps: &[Value], pure: bool) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if pure {
            self.memoize_pure(factory, deps)
        } else {
            self.memoize_positional(factory, deps)
        }
    }

    fn memoize_positional<T, F>(&self, factory: F, deps: &[Value]) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let index = {
            let mut table = self.table.lock();
            let index = table.index;
            table.index += 1;

            let overflow = table.in_pass && table.expected.is_some_and(|e| index >= e);
            if overflow {
                // The pass is already doomed to fail in end_pass.
                drop(table);
                return factory();
            }

            match table.slots.get_mut(index) {
                Some(slot) if slot.deps.as_slice() == deps => {
                    if let Some(hit) = slot.value.as_ref().and_then(|v| v.downcast_ref::<T>()) {
                        return hit.clone();
                    }
                    slot.value = None;
                }
                Some(slot) => {
                    slot.deps = deps.to_vec();
                    slot.value = None;
                }
                None => table.slots.push(Slot {
                    deps: deps.to_vec(),
                    value: None,
                }),
            }
            index
        };

        let value = factory();

        if let Some(slot) = self.table.lock().slots.get_mut(index) {
            slot.value = Some(Arc::new(value.clone()));
        }
        value
    }

    fn memoize_pure<T, F>(&self, factory: F, deps: &[Value]) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let key = pure_key(deps);

        {
            let mut table = self.table.lock();
            let cached = table
                .used_pure
                .get(&key)
                .or_else(|| table.pure.get(&key))
                .cloned();
            if let Some(cached) = cached {
                if let Some(hit) = cached.downcast_ref::<T>() {
                    let hit = hit.clone();
                    table.record_pure(key, cached);
                    return hit;
                }
            }
        }

        let value = factory();
        self.table
            .lock()
            .record_pure(key, Arc::new(value.clone()));
        value
    }

    /// Start a derivation pass.
    pub(crate) fn begin_pass(&self) {
        let mut table = self.table.lock();
        table.index = 0;
        table.used_pure = HashMap::new();
        table.in_pass = true;
    }

    /// Finish a derivation pass, checking the positional call count.
    pub(crate) fn end_pass(&self) -> Result<()> {
        let mut table = self.table.lock();
        table.in_pass = false;
        table.passes += 1;

        let actual = table.index;
        match table.expected {
            None => table.expected = Some(actual),
            Some(expected) if expected != actual => {
                return Err(FluxelError::MemoCountMismatch { expected, actual });
            }
            Some(_) => {}
        }

        table.pure = std::mem::take(&mut table.used_pure);
        Ok(())
    }

    /// Number of positional slots.
    pub fn slot_count(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Number of live pure entries.
    pub fn pure_count(&self) -> usize {
        let table = self.table.lock();
        if table.in_pass {
            table.used_pure.len()
        } else {
            table.pure.len()
        }
    }

    /// Number of completed passes.
    pub fn passes(&self) -> usize {
        self.table.lock().passes
    }
}

impl MemoTable {
    fn record_pure(&mut self, key: String, value: Cached) {
        if self.in_pass {
            self.used_pure.insert(key, value);
        } else {
            // Calls made between passes (through a handle from
            // `use_with_memo`) join the carried-over set directly.
            self.pure.insert(key, value);
        }
    }
}

/// Serialized form of a dependency array.
fn pure_key(deps: &[Value]) -> String {
    Value::Array(deps.to_vec()).to_string()
}

impl Debug for Memo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("Memo")
            .field("slots", &table.slots.len())
            .field("expected", &table.expected)
            .field("pure", &table.pure.len())
            .field("passes", &table.passes)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
