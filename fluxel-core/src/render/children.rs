//! Children Specifications
//!
//! A builder call receives its children as a [`Child`] tree: literal text,
//! existing nodes, reactive values and at most one level of lists.
//! [`normalize`] flattens that tree into the node list to attach and
//! classifies how it can change later.
//!
//! # Classification
//!
//! - **Variable length**: a reactive child evaluated to a list, or a
//!   top-level reactive child evaluated to a node. The number of children
//!   may change, so every update re-normalizes and reconciles.
//! - **Fixed slots**: a reactive child inside the top-level list that
//!   evaluated to a node, text or nothing. It always occupies exactly one
//!   position and updates replace (or re-text) only that position.
//!
//! A top-level reactive child that evaluated to text is a single fixed slot
//! whose text node is updated in place.

use serde_json::Value;
use smallvec::SmallVec;

use crate::dom::{Document, NodeId};
use crate::error::{FluxelError, Result};
use crate::reactive::Dependency;

/// A children specification.
#[derive(Debug, Clone, Default)]
pub enum Child {
    Text(String),
    Node(NodeId),
    Reactive(Dependency<ChildValue>),
    List(Vec<Child>),
    #[default]
    Empty,
}

/// The evaluated shape of a reactive child.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChildValue {
    Text(String),
    Node(NodeId),
    List(Vec<ChildValue>),
    #[default]
    Empty,
}

impl From<&str> for ChildValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ChildValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<NodeId> for ChildValue {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl<T: Into<ChildValue>> From<Vec<T>> for ChildValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ChildValue>> From<Option<T>> for ChildValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// JSON state values render as text; `null` renders nothing and arrays
/// become lists.
impl From<Value> for ChildValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<NodeId> for Child {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl From<Vec<Child>> for Child {
    fn from(items: Vec<Child>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<NodeId>> for Child {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self::List(nodes.into_iter().map(Self::Node).collect())
    }
}

impl From<ChildValue> for Child {
    fn from(value: ChildValue) -> Self {
        match value {
            ChildValue::Text(text) => Self::Text(text),
            ChildValue::Node(node) => Self::Node(node),
            ChildValue::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
            ChildValue::Empty => Self::Empty,
        }
    }
}

impl<T> From<Dependency<T>> for Child
where
    T: Into<ChildValue> + Clone + Send + Sync + 'static,
{
    fn from(dep: Dependency<T>) -> Self {
        Self::Reactive(dep.derive(|value| value.clone().into()))
    }
}

/// A reactive child with a fixed position.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) position: usize,
    pub(crate) dep: Dependency<ChildValue>,
    /// Node currently occupying the position.
    pub(crate) node: NodeId,
}

/// Result of flattening a children specification.
#[derive(Debug, Default)]
pub(crate) struct Normalized {
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) variable_length: bool,
    /// Positions of fixed slots whose current value is a node.
    pub(crate) reactive_index: SmallVec<[usize; 4]>,
    pub(crate) slots: Vec<Slot>,
}

impl Normalized {
    /// Whether every node is a text node.
    pub(crate) fn is_text_only(&self, doc: &Document) -> bool {
        self.nodes.iter().all(|n| doc.text(*n).is_some())
    }
}

/// Flatten `child` into nodes of `doc`, creating text nodes as needed.
pub(crate) fn normalize(doc: &Document, child: &Child) -> Result<Normalized> {
    let mut normalizer = Normalizer {
        doc,
        out: Normalized::default(),
    };
    normalizer.visit(child, 0)?;
    Ok(normalizer.out)
}

/// Every reactive dependency in `child`, in document order.
pub(crate) fn reactive_deps(child: &Child) -> Vec<Dependency<ChildValue>> {
    match child {
        Child::Reactive(dep) => vec![dep.clone()],
        Child::List(items) => items.iter().flat_map(reactive_deps).collect(),
        _ => Vec::new(),
    }
}

struct Normalizer<'a> {
    doc: &'a Document,
    out: Normalized,
}

impl Normalizer<'_> {
    fn push_text(&mut self, text: &str) -> NodeId {
        let node = self.doc.create_owned_text(text);
        self.out.nodes.push(node);
        node
    }

    /// `depth` is the number of lists enclosing `child`.
    fn visit(&mut self, child: &Child, depth: usize) -> Result<()> {
        match child {
            Child::Text(text) => {
                self.push_text(text);
            }
            Child::Node(node) => self.out.nodes.push(*node),
            Child::Empty => {}
            Child::List(items) => {
                if depth > 0 {
                    return Err(FluxelError::NestedChildren);
                }
                for item in items {
                    self.visit(item, depth + 1)?;
                }
            }
            Child::Reactive(dep) => self.visit_reactive(dep, depth)?,
        }
        Ok(())
    }

    fn visit_reactive(&mut self, dep: &Dependency<ChildValue>, depth: usize) -> Result<()> {
        let position = self.out.nodes.len();
        let node = match dep.get()? {
            ChildValue::List(items) => {
                self.out.variable_length = true;
                for item in items {
                    self.visit_value(item)?;
                }
                return Ok(());
            }
            ChildValue::Node(node) if depth == 0 => {
                self.out.variable_length = true;
                self.out.nodes.push(node);
                return Ok(());
            }
            ChildValue::Node(node) => {
                self.out.reactive_index.push(position);
                self.out.nodes.push(node);
                node
            }
            ChildValue::Text(text) => self.push_text(&text),
            ChildValue::Empty => self.push_text(""),
        };

        self.out.slots.push(Slot {
            position,
            dep: dep.clone(),
            node,
        });
        Ok(())
    }

    /// An item of an evaluated reactive list. Items may not be lists.
    fn visit_value(&mut self, value: ChildValue) -> Result<()> {
        match value {
            ChildValue::Text(text) => {
                self.push_text(&text);
            }
            ChildValue::Node(node) => self.out.nodes.push(node),
            ChildValue::Empty => {}
            ChildValue::List(_) => return Err(FluxelError::NestedChildren),
        }
        Ok(())
    }
}

/// Materialize an evaluated slot value as a single node.
pub(crate) fn slot_node(doc: &Document, value: ChildValue) -> Result<NodeId> {
    match value {
        ChildValue::Node(node) => Ok(node),
        ChildValue::Text(text) => Ok(doc.create_owned_text(&text)),
        ChildValue::Empty => Ok(doc.create_owned_text("")),
        ChildValue::List(_) => Err(FluxelError::NestedChildren),
    }
}
