//! Fluxel Core
//!
//! This crate provides the core of the Fluxel reactive UI library.
//! It implements:
//!
//! - Reactive primitives (cells, dependencies, derivations, memoization)
//! - A state container with change events and batched composite views
//! - A node builder that binds reactive values to a live node tree
//! - A child reconciler and a listener lifecycle store
//! - Server rendering and hydration
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Cells, dependencies, memo tables, state, task queue
//! - `dom`: The live node arena, lifecycle store and HTML serialization
//! - `render`: Render context, node builder, children and reconciliation
//! - `ssr`: `render_to_string` and `hydrate`
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use fluxel_core::dom::Document;
//! use fluxel_core::reactive::TaskQueue;
//! use fluxel_core::render::{build, RenderContext};
//! use serde_json::json;
//!
//! let ctx = RenderContext::new(Document::new(), TaskQueue::new());
//! let (state, label) = ctx
//!     .reactive(json!({ "count": 0 }), |state| {
//!         let count = state.use_derived("count", |v, _| format!("Count: {v}"));
//!         (state.clone(), build(&ctx, "span", count))
//!     })
//!     .unwrap();
//! let label = label.unwrap();
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(ctx.document().text_content(label), "Count: 5");
//! ```

pub mod dom;
pub mod error;
pub mod reactive;
pub mod render;
pub mod ssr;

pub use dom::{Document, NodeId};
pub use error::{FluxelError, Result};
pub use reactive::{Dependency, Memo, State, TaskQueue};
pub use render::{build, fragment, stateful_component, Child, ChildValue, Props, RenderContext};
pub use ssr::{hydrate, render_to_string, SsrOptions, SsrOutput};
