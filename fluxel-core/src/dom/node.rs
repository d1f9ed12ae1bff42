//! Display Nodes
//!
//! This module defines the node types that live in a [`Document`].
//!
//! [`Document`]: super::Document

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

/// Unique identifier for a display node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of a display node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a tag, properties and children.
    Element,
    /// A text leaf.
    Text,
}

/// An event delivered to element listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Lowercase event name, e.g. `click`.
    pub name: String,
    pub target: NodeId,
}

/// Element event listener.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Options recorded with each event listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// The listener promises not to cancel the event.
    pub passive: bool,
}

#[derive(Clone)]
pub(crate) struct RegisteredHandler {
    pub(crate) event: String,
    pub(crate) handler: EventHandler,
    pub(crate) options: ListenerOptions,
}

/// Element payload.
#[derive(Clone, Default)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) properties: IndexMap<String, Value>,
    pub(crate) style: IndexMap<String, String>,
    pub(crate) classes: IndexSet<String>,
    pub(crate) dataset: IndexMap<String, String>,
    pub(crate) handlers: Vec<RegisteredHandler>,
    pub(crate) children: Vec<NodeId>,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub(crate) enum NodeData {
    Element(ElementData),
    Text(String),
}

/// A node in the arena.
#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn element(tag: &str) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            data: NodeData::Element(ElementData::new(tag)),
        }
    }

    pub(crate) fn text(content: &str) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            data: NodeData::Text(content.to_string()),
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        }
    }

    pub(crate) fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        self.as_element()
            .map(|el| el.children.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("id", &self.id).field("parent", &self.parent);
        match &self.data {
            NodeData::Element(el) => s
                .field("tag", &el.tag)
                .field("children", &el.children.len()),
            NodeData::Text(text) => s.field("text", text),
        };
        s.finish()
    }
}
