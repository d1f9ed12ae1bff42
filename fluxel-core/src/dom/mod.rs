//! Display Node Tree
//!
//! The live tree the renderer mutates: an arena of element and text nodes
//! ([`Document`]), the store that ties reactive subscriptions to the nodes
//! they patch ([`LifecycleStore`]), and HTML serialization for server
//! output.
//!
//! # Design Decisions
//!
//! 1. Nodes are addressed by [`NodeId`] rather than by reference, so
//!    callbacks can hold on to a node without keeping the tree alive.
//!
//! 2. There is no shadow tree. The reconciler always reads the current
//!    children from the document.

mod document;
mod html;
mod lifecycle;
mod node;

pub use document::{Document, WeakDocument};
pub use lifecycle::{Cleanup, LifecycleStore};
pub use node::{handler, Event, EventHandler, ListenerOptions, NodeId, NodeKind};
