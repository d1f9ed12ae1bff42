//! Error Types
//!
//! Every fallible operation in the crate returns [`FluxelError`]. Contract
//! violations (wrong argument shapes, writes to read-only dependencies,
//! inconsistent memo usage) fail immediately; nothing is coerced.

use thiserror::Error;

use crate::dom::NodeId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FluxelError>;

/// Errors raised by the reactive core, the node builder and SSR/hydration.
#[derive(Debug, Error)]
pub enum FluxelError {
    /// A derived or composite dependency was written to.
    #[error("cannot set value of {kind} dependency")]
    ReadOnlyDependency { kind: &'static str },

    /// A reserved state key (`render`, `use`, ...) was written to.
    #[error("cannot set reserved state key '{0}'")]
    ReservedKey(String),

    /// Initial state for a container was not a JSON object.
    #[error("initial state must be an object, got {0}")]
    InvalidInitialState(&'static str),

    /// A derive function called `memoize` a different number of times than
    /// on its first run.
    #[error(
        "memoization count mismatch: expected {expected} memo calls, got {actual}; \
         memoize must not be called conditionally"
    )]
    MemoCountMismatch { expected: usize, actual: usize },

    #[error("textContent is not allowed in element options, use children instead")]
    TextContentAttribute,

    /// An `on*` attribute held something other than handlers.
    #[error("expected function for event handler '{key}'")]
    InvalidEventHandler { key: String },

    #[error("invalid tag name '{0}'")]
    InvalidTagName(String),

    #[error("children cannot be nested more than one level deep")]
    NestedChildren,

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("node {0:?} is a text node, expected an element")]
    NotAnElement(NodeId),

    /// A node was inserted under itself or one of its descendants, or under
    /// a text node.
    #[error("cannot insert {child:?} under {parent:?}")]
    Hierarchy { parent: NodeId, child: NodeId },

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {child:?} is still attached to {parent:?}")]
    StillAttached { parent: NodeId, child: NodeId },

    #[error("markup parse error at byte {offset}: {message}")]
    Markup { offset: usize, message: String },

    #[error("element is not a fluxel SSR element")]
    NotSsrElement,

    #[error("essential data attribute 'data-fluxel-e-count' is missing or invalid: {0:?}")]
    InvalidElementCount(Option<String>),

    #[error("element with eid {0} not found; the renderer does not match the SSR output")]
    HydrationElementMissing(usize),

    /// The renderer failed while hydrating. The cause is chained.
    #[error("hydration failed; ensure the renderer matches the server output")]
    Hydration {
        #[source]
        source: Box<FluxelError>,
    },
}

impl FluxelError {
    pub(crate) fn derived_read_only() -> Self {
        Self::ReadOnlyDependency { kind: "derived" }
    }

    pub(crate) fn composite_read_only() -> Self {
        Self::ReadOnlyDependency { kind: "composite" }
    }
}
