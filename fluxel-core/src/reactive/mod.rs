//! Reactive Primitives
//!
//! This module implements the reactive half of Fluxel: observable cells,
//! dependencies and derivations, memoization, the state container, and the
//! task queue used for deferred recomputation.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] holds a value and a list of listeners. Setting it notifies
//! every listener in registration order.
//!
//! ## Dependencies
//!
//! A [`Dependency`] is the uniform view the renderer consumes: read the
//! value, maybe write it, and subscribe to "may have changed"
//! notifications. Derived dependencies recompute on each read and forward
//! subscriptions to their base.
//!
//! ## Memos
//!
//! A [`Memo`] caches sub-computations of a derive function, either by call
//! position or by the content of a dependency array.
//!
//! ## State
//!
//! A [`State`] container owns named JSON slots and creates dependencies for
//! them on demand.
//!
//! # Implementation Notes
//!
//! Subscriptions are explicit: nothing is tracked implicitly while a
//! function runs. Whoever reads a dependency and wants updates registers a
//! listener and keeps the returned [`Subscription`].

mod cell;
mod dependency;
mod events;
mod memo;
mod scheduler;
mod state;
mod subscriber;

pub use cell::Cell;
pub use dependency::Dependency;
pub use events::{ListenTarget, ListenerId, StateEvent, RENDER_EVENT};
pub use memo::Memo;
pub use scheduler::{coalesce, Coalesced, TaskHandle, TaskQueue};
pub use state::{reactive, State, RESERVED_KEYS};
pub use subscriber::{listener, Listener, ListenerList, SubscriberId, Subscription};
