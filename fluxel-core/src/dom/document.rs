//! Document Arena
//!
//! A [`Document`] owns every display node the renderer touches. Nodes are
//! addressed by [`NodeId`] and mutated in place; there is no intermediate
//! tree kept between updates, so the children stored here are always the
//! live "before" state the reconciler diffs against.
//!
//! # Thread Safety
//!
//! The arena sits behind one `parking_lot::RwLock`. Every method takes the
//! lock for the duration of a single structural operation and releases it
//! before running user code (event handlers, lifecycle cleanups).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{FluxelError, Result};

use super::html;
use super::lifecycle::{LifecycleStore, WeakLifecycle};
use super::node::{
    ElementData, Event, EventHandler, ListenerOptions, Node, NodeData, NodeId, NodeKind,
    RegisteredHandler,
};

#[derive(Default)]
pub(crate) struct DocumentInner {
    pub(crate) nodes: HashMap<NodeId, Node>,
    /// Nodes the document created for itself (normalized text, parsed
    /// markup). Freed as soon as they are discarded while detached.
    owned: HashSet<NodeId>,
    elements_created: usize,
}

impl DocumentInner {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(FluxelError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(FluxelError::UnknownNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        self.node_mut(id)?
            .as_element_mut()
            .ok_or(FluxelError::NotAnElement(id))
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    fn insert_owned(&mut self, node: Node) -> NodeId {
        let id = self.insert(node);
        self.owned.insert(id);
        id
    }

    /// Drop `id` from the arena if it is owned and detached.
    fn release_owned(&mut self, id: NodeId) -> bool {
        let detached = self.nodes.get(&id).is_some_and(|n| n.parent.is_none());
        if detached && self.owned.remove(&id) {
            let mut subtree = Vec::new();
            self.preorder(id, &mut subtree);
            for node in subtree {
                self.owned.remove(&node);
                self.nodes.remove(&node);
            }
            true
        } else {
            false
        }
    }

    /// Whether `candidate` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, child: NodeId) -> Result<()> {
        let parent = self.node(child)?.parent;
        if let Some(parent) = parent {
            if let Ok(el) = self.element_mut(parent) {
                el.children.retain(|c| *c != child);
            }
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(child)?;
        if self.node(parent)?.as_element().is_none()
            || self.is_inclusive_ancestor(child, parent)
        {
            return Err(FluxelError::Hierarchy { parent, child });
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insert(parent, child)?;
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(FluxelError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        self.detach(child)?;
        let el = self.element_mut(parent)?;
        let index = reference
            .and_then(|r| el.children.iter().position(|c| *c == r))
            .unwrap_or(el.children.len());
        el.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn preorder(&self, root: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children().iter().rev().copied());
        }
    }
}

/// Shared arena of display nodes. Clones share the same document.
#[derive(Clone, Default)]
pub struct Document {
    inner: Arc<RwLock<DocumentInner>>,
    lifecycle: LifecycleStore,
}

/// Non-owning handle to a [`Document`], held by update callbacks so a
/// subscription never keeps its document alive.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<RwLock<DocumentInner>>,
    lifecycle: WeakLifecycle,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        Some(Document {
            inner: self.inner.upgrade()?,
            lifecycle: self.lifecycle.upgrade()?,
        })
    }
}

impl fmt::Debug for WeakDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDocument")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Arc::downgrade(&self.inner),
            lifecycle: self.lifecycle.downgrade(),
        }
    }

    // ---- Creation ----

    /// Create a detached element. Counted by [`Document::elements_created`].
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut inner = self.inner.write();
        inner.elements_created += 1;
        inner.insert(Node::element(tag))
    }

    /// Create an element that does not count as renderer output (parsing).
    pub(crate) fn create_element_uncounted(&self, tag: &str) -> NodeId {
        self.inner.write().insert(Node::element(tag))
    }

    /// Create a detached text node.
    pub fn create_text(&self, content: &str) -> NodeId {
        self.inner.write().insert(Node::text(content))
    }

    /// Create a text node the document frees once it is discarded.
    pub(crate) fn create_owned_text(&self, content: &str) -> NodeId {
        self.inner.write().insert_owned(Node::text(content))
    }

    /// Number of elements created through [`Document::create_element`].
    pub fn elements_created(&self) -> usize {
        self.inner.read().elements_created
    }

    /// Number of nodes in the arena, attached or not. Detached nodes the
    /// caller created stay until [`Document::release`].
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    // ---- Structure ----

    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.read().nodes.contains_key(&node)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.read().nodes.get(&node).map(Node::kind)
    }

    /// Tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .map(|el| el.tag.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.read().nodes.get(&node).and_then(|n| n.parent)
    }

    /// Snapshot of the live children of `node`.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .map(|n| n.children().to_vec())
            .unwrap_or_default()
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        let inner = self.inner.read();
        inner.nodes.get(&node).map_or(0, |n| n.children().len())
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(|n| n.children().get(index).copied())
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.inner.write().insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or append when `None`).
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.inner.write().insert_before(parent, child, reference)
    }

    /// Detach `child` from `parent`. The node stays in the arena.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.node(child)?.parent != Some(parent) {
            return Err(FluxelError::NotAChild { parent, child });
        }
        inner.detach(child)
    }

    /// Put `new` in the position of `old` under `parent`.
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.node(old)?.parent != Some(parent) {
            return Err(FluxelError::NotAChild { parent, child: old });
        }
        if new == old {
            return Ok(());
        }
        inner.check_insert(parent, new)?;
        inner.detach(new)?;

        let el = inner.element_mut(parent)?;
        let Some(index) = el.children.iter().position(|c| *c == old) else {
            return Err(FluxelError::NotAChild { parent, child: old });
        };
        el.children[index] = new;
        inner.node_mut(old)?.parent = None;
        inner.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    /// Detach every child of `parent` and append `children` in order.
    /// Discarded text the document created itself is freed.
    pub fn replace_children(&self, parent: NodeId, children: &[NodeId]) -> Result<()> {
        let mut inner = self.inner.write();
        let previous = inner.node(parent)?.children().to_vec();
        for child in &previous {
            inner.detach(*child)?;
        }
        for child in children {
            inner.insert_before(parent, *child, None)?;
        }
        for child in previous {
            inner.release_owned(child);
        }
        Ok(())
    }

    /// Free `node` if the document created it itself and it is detached.
    /// Returns whether it was removed from the arena.
    pub(crate) fn release_owned(&self, node: NodeId) -> bool {
        self.inner.write().release_owned(node)
    }

    /// Run the cleanups of a detached subtree and remove every node in it
    /// from the arena. Returns the number of nodes removed.
    pub fn release(&self, node: NodeId) -> Result<usize> {
        if let Some(parent) = self.inner.read().node(node)?.parent {
            return Err(FluxelError::StillAttached { parent, child: node });
        }
        self.cleanup_subtree(node);

        let mut inner = self.inner.write();
        let mut subtree = Vec::new();
        inner.preorder(node, &mut subtree);
        for id in &subtree {
            inner.owned.remove(id);
            inner.nodes.remove(id);
        }
        tracing::trace!(?node, nodes = subtree.len(), "released subtree");
        Ok(subtree.len())
    }

    /// `node` followed by all of its descendants in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.inner.read().preorder(node, &mut out);
        out
    }

    /// First element under `root` (inclusive) whose dataset has `key = value`.
    pub fn find_by_data(&self, root: NodeId, key: &str, value: &str) -> Option<NodeId> {
        let inner = self.inner.read();
        let mut order = Vec::new();
        inner.preorder(root, &mut order);
        order.into_iter().find(|id| {
            inner
                .nodes
                .get(id)
                .and_then(Node::as_element)
                .and_then(|el| el.dataset.get(key))
                .is_some_and(|v| v == value)
        })
    }

    // ---- Text ----

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.inner.read().nodes.get(&node)?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element(_) => None,
        }
    }

    /// Set text content. On an element, every child is detached and
    /// replaced with a single text node.
    pub fn set_text(&self, node: NodeId, content: &str) -> Result<()> {
        let mut inner = self.inner.write();
        match &mut inner.node_mut(node)?.data {
            NodeData::Text(text) => {
                *text = content.to_string();
                return Ok(());
            }
            NodeData::Element(_) => {}
        }

        let previous = inner.node(node)?.children().to_vec();
        for child in &previous {
            inner.detach(*child)?;
        }
        for child in previous {
            inner.release_owned(child);
        }
        let text = inner.insert_owned(Node::text(content));
        inner.insert_before(node, text, None)
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.read();
        let mut order = Vec::new();
        inner.preorder(node, &mut order);
        order
            .iter()
            .filter_map(|id| match &inner.nodes.get(id)?.data {
                NodeData::Text(text) => Some(text.as_str()),
                NodeData::Element(_) => None,
            })
            .collect()
    }

    // ---- Properties ----

    pub fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .and_then(|el| el.properties.get(name).cloned())
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: Value) -> Result<()> {
        self.inner
            .write()
            .element_mut(node)?
            .properties
            .insert(name.to_string(), value);
        Ok(())
    }

    pub fn remove_property(&self, node: NodeId, name: &str) -> Result<Option<Value>> {
        Ok(self
            .inner
            .write()
            .element_mut(node)?
            .properties
            .shift_remove(name))
    }

    // ---- Style ----

    pub fn style(&self, node: NodeId, name: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .and_then(|el| el.style.get(name).cloned())
    }

    /// All style declarations in assignment order.
    pub fn styles(&self, node: NodeId) -> IndexMap<String, String> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .map(|el| el.style.clone())
            .unwrap_or_default()
    }

    /// Set a style declaration, or remove it with `None`.
    pub fn set_style(&self, node: NodeId, name: &str, value: Option<&str>) -> Result<()> {
        let mut inner = self.inner.write();
        let style = &mut inner.element_mut(node)?.style;
        match value {
            Some(value) => {
                style.insert(name.to_string(), value.to_string());
            }
            None => {
                style.shift_remove(name);
            }
        }
        Ok(())
    }

    // ---- Classes ----

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .map(|el| el.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .is_some_and(|el| el.classes.contains(class))
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<()> {
        self.inner
            .write()
            .element_mut(node)?
            .classes
            .insert(class.to_string());
        Ok(())
    }

    /// Replace the whole class list.
    pub fn set_classes<I, S>(&self, node: NodeId, classes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.write();
        let el = inner.element_mut(node)?;
        el.classes.clear();
        el.classes.extend(classes.into_iter().map(Into::into));
        Ok(())
    }

    // ---- Dataset ----

    pub fn data(&self, node: NodeId, key: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .and_then(|el| el.dataset.get(key).cloned())
    }

    pub fn set_data(&self, node: NodeId, key: &str, value: &str) -> Result<()> {
        self.inner
            .write()
            .element_mut(node)?
            .dataset
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_data(&self, node: NodeId, key: &str) -> Result<()> {
        self.inner.write().element_mut(node)?.dataset.shift_remove(key);
        Ok(())
    }

    // ---- Events ----

    pub fn add_event_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
        options: ListenerOptions,
    ) -> Result<()> {
        self.inner
            .write()
            .element_mut(node)?
            .handlers
            .push(RegisteredHandler {
                event: event.to_string(),
                handler,
                options,
            });
        Ok(())
    }

    /// Options of every listener registered for `event`, in order.
    pub fn listener_options(&self, node: NodeId, event: &str) -> Vec<ListenerOptions> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(&node)
            .and_then(Node::as_element)
            .map(|el| {
                el.handlers
                    .iter()
                    .filter(|h| h.event == event)
                    .map(|h| h.options)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run the listeners `node` has for `event`. Events do not bubble.
    /// Returns the number of handlers called.
    pub fn dispatch_event(&self, node: NodeId, event: &str) -> Result<usize> {
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.read();
            let el = inner
                .node(node)?
                .as_element()
                .ok_or(FluxelError::NotAnElement(node))?;
            el.handlers
                .iter()
                .filter(|h| h.event == event)
                .map(|h| Arc::clone(&h.handler))
                .collect()
        };

        let payload = Event {
            name: event.to_string(),
            target: node,
        };
        for handler in &handlers {
            handler(&payload);
        }
        Ok(handlers.len())
    }

    // ---- Lifecycle ----

    pub fn lifecycle(&self) -> &LifecycleStore {
        &self.lifecycle
    }

    /// Run and drop every cleanup registered for `node` and its
    /// descendants. Returns the number of cleanups run.
    pub fn cleanup_subtree(&self, node: NodeId) -> usize {
        let subtree = self.descendants(node);
        let cleanups = self.lifecycle.take(&subtree);
        let count = cleanups.len();
        for cleanup in cleanups {
            cleanup();
        }
        tracing::trace!(?node, nodes = subtree.len(), cleanups = count, "subtree cleanup");
        count
    }

    // ---- Markup ----

    /// Serialize `node` and its descendants as HTML.
    pub fn outer_html(&self, node: NodeId) -> Result<String> {
        let inner = self.inner.read();
        inner.node(node)?;
        let mut out = String::new();
        html::serialize(&inner.nodes, node, &mut out);
        Ok(out)
    }

    /// Parse markup into detached nodes of this document and return the
    /// top-level nodes. Parsed elements are not counted as created.
    pub fn parse_html(&self, markup: &str) -> Result<Vec<NodeId>> {
        let parsed = html::parse(markup)?;
        let mut roots = Vec::with_capacity(parsed.len());
        for node in parsed {
            roots.push(self.materialize(node)?);
        }
        Ok(roots)
    }

    fn materialize(&self, parsed: html::Parsed) -> Result<NodeId> {
        match parsed {
            html::Parsed::Text(text) => Ok(self.create_owned_text(&text)),
            html::Parsed::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.create_element_uncounted(&tag);
                for (name, value) in attributes {
                    self.apply_parsed_attribute(id, &name, value)?;
                }
                for child in children {
                    let child = self.materialize(child)?;
                    self.append_child(id, child)?;
                }
                Ok(id)
            }
        }
    }

    fn apply_parsed_attribute(&self, node: NodeId, name: &str, value: Option<String>) -> Result<()> {
        match (name, value) {
            ("class", Some(value)) => self.set_classes(node, value.split_whitespace()),
            ("style", Some(value)) => {
                for (key, value) in html::parse_style(&value) {
                    self.set_style(node, &key, Some(&value))?;
                }
                Ok(())
            }
            (name, value) if name.starts_with("data-") => {
                let key = html::data_key(&name["data-".len()..]);
                self.set_data(node, &key, value.as_deref().unwrap_or_default())
            }
            (name, Some(value)) => self.set_property(node, name, Value::String(value)),
            (name, None) => self.set_property(node, name, Value::Bool(true)),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("elements_created", &inner.elements_created)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::handler;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn list(doc: &Document, n: usize) -> (NodeId, Vec<NodeId>) {
        let parent = doc.create_element("ul");
        let items: Vec<NodeId> = (0..n).map(|_| doc.create_element("li")).collect();
        for item in &items {
            doc.append_child(parent, *item).unwrap();
        }
        (parent, items)
    }

    #[test]
    fn append_and_insert_before() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 2);
        let first = doc.create_element("li");

        doc.insert_before(ul, first, Some(items[0])).unwrap();
        assert_eq!(doc.children(ul), vec![first, items[0], items[1]]);
        assert_eq!(doc.parent(first), Some(ul));
        assert_eq!(doc.elements_created(), 4);
    }

    #[test]
    fn inserting_attached_node_moves_it() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 3);

        doc.insert_before(ul, items[2], Some(items[0])).unwrap();
        assert_eq!(doc.children(ul), vec![items[2], items[0], items[1]]);

        let other = doc.create_element("ol");
        doc.append_child(other, items[0]).unwrap();
        assert_eq!(doc.children(ul), vec![items[2], items[1]]);
        assert_eq!(doc.parent(items[0]), Some(other));
    }

    #[test]
    fn hierarchy_violations_fail() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 1);
        let text = doc.create_text("x");

        assert!(matches!(
            doc.append_child(items[0], ul),
            Err(FluxelError::Hierarchy { .. })
        ));
        assert!(matches!(
            doc.append_child(ul, ul),
            Err(FluxelError::Hierarchy { .. })
        ));
        assert!(matches!(
            doc.append_child(text, items[0]),
            Err(FluxelError::Hierarchy { .. })
        ));
    }

    #[test]
    fn replace_and_remove_child() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 3);
        let fresh = doc.create_element("li");

        doc.replace_child(ul, fresh, items[1]).unwrap();
        assert_eq!(doc.children(ul), vec![items[0], fresh, items[2]]);
        assert_eq!(doc.parent(items[1]), None);

        doc.remove_child(ul, items[0]).unwrap();
        assert_eq!(doc.children(ul), vec![fresh, items[2]]);
        assert!(matches!(
            doc.remove_child(ul, items[0]),
            Err(FluxelError::NotAChild { .. })
        ));
    }

    #[test]
    fn set_text_on_element_replaces_children() {
        let doc = Document::new();
        let (ul, _) = list(&doc, 2);

        doc.set_text(ul, "empty").unwrap();
        assert_eq!(doc.child_count(ul), 1);
        assert_eq!(doc.text_content(ul), "empty");
    }

    #[test]
    fn repeated_set_text_does_not_grow_the_arena() {
        let doc = Document::new();
        let p = doc.create_element("p");
        doc.set_text(p, "0").unwrap();
        let baseline = doc.node_count();

        for i in 1..50 {
            doc.set_text(p, &i.to_string()).unwrap();
        }
        assert_eq!(doc.node_count(), baseline);
        assert_eq!(doc.text_content(p), "49");
    }

    #[test]
    fn caller_text_survives_replacement() {
        let doc = Document::new();
        let p = doc.create_element("p");
        let mine = doc.create_text("kept");
        doc.append_child(p, mine).unwrap();

        doc.replace_children(p, &[]).unwrap();
        assert!(doc.contains(mine));
        doc.append_child(p, mine).unwrap();
        assert_eq!(doc.text_content(p), "kept");
    }

    #[test]
    fn release_frees_detached_subtree() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 2);
        let cleaned = Arc::new(AtomicI32::new(0));
        let cleaned_clone = cleaned.clone();
        doc.lifecycle().register(items[1], move || {
            cleaned_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(
            doc.release(items[0]),
            Err(FluxelError::StillAttached { .. })
        ));

        let root = doc.create_element("div");
        doc.append_child(root, ul).unwrap();
        doc.remove_child(root, ul).unwrap();
        assert_eq!(doc.release(ul).unwrap(), 3);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert_eq!(doc.node_count(), 1);
        assert!(!doc.contains(items[1]));
    }

    #[test]
    fn attributes_round_trip_through_accessors() {
        let doc = Document::new();
        let div = doc.create_element("div");

        doc.set_property(div, "id", json!("main")).unwrap();
        doc.set_style(div, "color", Some("red")).unwrap();
        doc.set_classes(div, ["a", "b"]).unwrap();
        doc.set_data(div, "userId", "7").unwrap();

        assert_eq!(doc.property(div, "id"), Some(json!("main")));
        assert_eq!(doc.style(div, "color").as_deref(), Some("red"));
        assert_eq!(doc.classes(div), vec!["a", "b"]);
        assert_eq!(doc.data(div, "userId").as_deref(), Some("7"));

        doc.set_style(div, "color", None).unwrap();
        assert!(doc.styles(div).is_empty());

        let text = doc.create_text("t");
        assert!(matches!(
            doc.set_property(text, "id", json!(1)),
            Err(FluxelError::NotAnElement(_))
        ));
    }

    #[test]
    fn dispatch_event_runs_matching_handlers() {
        let doc = Document::new();
        let button = doc.create_element("button");
        let clicks = Arc::new(AtomicI32::new(0));

        let clicks_clone = clicks.clone();
        doc.add_event_listener(
            button,
            "click",
            handler(move |e| {
                assert_eq!(e.name, "click");
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
            ListenerOptions { passive: true },
        )
        .unwrap();

        assert_eq!(doc.dispatch_event(button, "click").unwrap(), 1);
        assert_eq!(doc.dispatch_event(button, "input").unwrap(), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(
            doc.listener_options(button, "click"),
            vec![ListenerOptions { passive: true }]
        );
    }

    #[test]
    fn cleanup_subtree_walks_descendants() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 2);
        let inner = doc.create_element("span");
        doc.append_child(items[1], inner).unwrap();

        let count = Arc::new(AtomicI32::new(0));
        for node in [ul, items[0], inner] {
            let count = count.clone();
            doc.lifecycle().register(node, move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(doc.cleanup_subtree(items[1]), 1);
        assert_eq!(doc.cleanup_subtree(ul), 2);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(doc.lifecycle().is_empty());
    }

    #[test]
    fn weak_handle_does_not_keep_document_alive() {
        let doc = Document::new();
        let weak = doc.downgrade();
        let div = weak.upgrade().unwrap().create_element("div");
        assert!(doc.contains(div));

        drop(doc);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn find_by_data_searches_in_document_order() {
        let doc = Document::new();
        let (ul, items) = list(&doc, 3);
        doc.set_data(items[1], "key", "x").unwrap();
        doc.set_data(items[2], "key", "x").unwrap();

        assert_eq!(doc.find_by_data(ul, "key", "x"), Some(items[1]));
        assert_eq!(doc.find_by_data(ul, "key", "y"), None);
        assert_eq!(doc.descendants(ul), vec![ul, items[0], items[1], items[2]]);
    }
}
