//! Task Queue
//!
//! Deferred work runs on a [`TaskQueue`] instead of inline. The host drives
//! the queue one tick at a time with [`TaskQueue::run_pending`], the same
//! way an event loop drains its zero-delay timers.
//!
//! # Ticks
//!
//! A tick runs every task that was queued when it started, in FIFO order.
//! Tasks scheduled while a tick is running wait for the next tick.
//!
//! # Coalescing
//!
//! [`coalesce`] wraps a listener so that any number of triggers before the
//! next tick produce exactly one queued run. Composite dependencies use it
//! to collapse several key writes from one handler into one recomputation.
//!
//! # Cancellation
//!
//! Every task carries a "still relevant" flag captured when it was
//! scheduled. [`TaskHandle::cancel`] clears it and the task is skipped when
//! its tick comes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::subscriber::{listener, Listener};

struct Task {
    run: Box<dyn FnOnce() + Send>,
    live: Arc<AtomicBool>,
}

/// Handle to a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    live: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Skip the task if it has not run yet.
    pub fn cancel(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.live.load(Ordering::SeqCst)
    }
}

/// FIFO queue of deferred tasks. Clones share the queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    pending: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `f` to the next tick.
    pub fn schedule<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let live = Arc::new(AtomicBool::new(true));
        self.pending.lock().push_back(Task {
            run: Box::new(f),
            live: Arc::clone(&live),
        });
        TaskHandle { live }
    }

    /// Run one tick. Returns the number of tasks that actually ran.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.lock());
        let mut ran = 0;

        for task in batch {
            if task.live.load(Ordering::SeqCst) {
                (task.run)();
                ran += 1;
            }
        }

        if ran > 0 {
            tracing::trace!(ran, "task queue tick");
        }
        ran
    }

    /// Run ticks until the queue is empty or `max_ticks` is reached.
    /// Returns the total number of tasks run.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut total = 0;
        for _ in 0..max_ticks {
            if self.is_idle() {
                break;
            }
            total += self.run_pending();
        }
        total
    }

    /// Number of queued tasks, cancelled ones included.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// A listener wrapped so repeated triggers collapse into one deferred run.
pub struct Coalesced {
    trigger: Listener,
    scheduled: Arc<Mutex<Option<TaskHandle>>>,
}

impl Coalesced {
    /// The wrapped listener to register with each source.
    pub fn trigger(&self) -> Listener {
        Arc::clone(&self.trigger)
    }

    /// Cancel a queued run, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.scheduled.lock().take() {
            handle.cancel();
        }
    }
}

/// Wrap `target` so that triggers before the next tick run it once.
pub fn coalesce(queue: &TaskQueue, target: Listener) -> Coalesced {
    let scheduled: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
    let queue = queue.clone();
    let slot = Arc::clone(&scheduled);

    let trigger = listener(move || {
        let mut pending = slot.lock();
        if pending.as_ref().is_some_and(|h| !h.is_cancelled()) {
            return;
        }

        let target = Arc::clone(&target);
        let slot = Arc::clone(&slot);
        *pending = Some(queue.schedule(move || {
            slot.lock().take();
            target();
        }));
    });

    Coalesced { trigger, scheduled }
}
