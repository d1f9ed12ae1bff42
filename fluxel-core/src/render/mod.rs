//! Rendering
//!
//! Maps reactive values onto the live node tree.
//!
//! - [`RenderContext`] is threaded explicitly through every component.
//! - [`build`] creates (or, when hydrating, adopts) an element and wires its
//!   reactive attributes and children.
//! - The reconciler ([`reconcile_children`]) patches a variable-length child
//!   list; fixed reactive slots are replaced one position at a time.

mod builder;
mod children;
mod context;
mod reconcile;

pub use builder::{build, fragment, AttrValue, ClassEntry, ClassList, ElementSpec, PropValue, Props};
pub use children::{Child, ChildValue};
pub use context::{stateful_component, Location, RenderContext, RenderMode};
pub use reconcile::{plan_kept, reconcile_children, ReconcileStats};
