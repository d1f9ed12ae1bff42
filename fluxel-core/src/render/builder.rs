//! Node Builder
//!
//! [`build`] turns a tag name and a children/props specification into an
//! element, wiring every reactive value to a subscription that patches the
//! element when the value may have changed.
//!
//! # Processing order
//!
//! 1. A `textContent` attribute is rejected.
//! 2. Children are normalized.
//! 3. `on*` attributes become event listeners (all passive). Anything other
//!    than handlers under an `on*` key is an error.
//! 4. Style declarations are applied; reactive ones are subscribed.
//! 5. The class list is applied; a reactive class list rebuilds the whole
//!    class attribute on change.
//! 6. Dataset entries are applied; reactive ones are subscribed.
//! 7. Remaining reactive attributes are subscribed and seeded.
//! 8. Remaining plain attributes are assigned as properties.
//!
//! Handlers stored under a key that is not an event are dropped with a
//! warning, never stringified. `className` is dropped; use the class list.
//!
//! # Hydration
//!
//! While the render context is hydrating, the element comes from server
//! markup. Static values and the initial values of reactive ones are
//! assumed to be in the markup already and are not applied again, but
//! every subscription is still wired.
//!
//! Every subscription made here is registered with the document's
//! lifecycle store under the element it patches.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde_json::Value;

use crate::dom::{Document, EventHandler, ListenerOptions, NodeId, WeakDocument};
use crate::error::{FluxelError, Result};
use crate::reactive::{listener, Dependency, Subscription};

use super::children::{normalize, reactive_deps, slot_node, Child, ChildValue, Normalized, Slot};
use super::context::RenderContext;
use super::reconcile::{reconcile_children, replace_slot};

// ----------------------------------------------------------------------------
// Attribute values
// ----------------------------------------------------------------------------

/// A style declaration or dataset value.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Static(Value),
    Reactive(Dependency<Value>),
}

impl AttrValue {
    /// A reactive value from any dependency whose value converts to JSON.
    pub fn reactive<T>(dep: &Dependency<T>) -> Self
    where
        T: Into<Value> + Clone + Send + Sync + 'static,
    {
        Self::Reactive(dep.derive(|v| v.clone().into()))
    }
}

/// An element attribute: a value, a reactive value or event handlers.
#[derive(Clone)]
pub enum PropValue {
    Static(Value),
    Reactive(Dependency<Value>),
    Handler(Vec<EventHandler>),
}

impl std::fmt::Debug for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Reactive(d) => f.debug_tuple("Reactive").field(d).finish(),
            Self::Handler(h) => write!(f, "Handler({} fns)", h.len()),
        }
    }
}

macro_rules! impl_static_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    Self::Static(Value::from(value))
                }
            }

            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    Self::Static(Value::from(value))
                }
            }
        )*
    };
}

impl_static_from!(&str, String, bool, i32, i64, u32, u64, f64, Value);

impl From<Dependency<Value>> for AttrValue {
    fn from(dep: Dependency<Value>) -> Self {
        Self::Reactive(dep)
    }
}

impl From<Dependency<Value>> for PropValue {
    fn from(dep: Dependency<Value>) -> Self {
        Self::Reactive(dep)
    }
}

impl From<AttrValue> for PropValue {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Static(v) => Self::Static(v),
            AttrValue::Reactive(d) => Self::Reactive(d),
        }
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        Self::Handler(vec![handler])
    }
}

impl From<Vec<EventHandler>> for PropValue {
    fn from(handlers: Vec<EventHandler>) -> Self {
        Self::Handler(handlers)
    }
}

/// One entry of a mixed class list. `None` and empty strings are skipped.
#[derive(Debug, Clone)]
pub enum ClassEntry {
    Static(Option<String>),
    Reactive(Dependency<Option<String>>),
}

impl From<&str> for ClassEntry {
    fn from(class: &str) -> Self {
        Self::Static(Some(class.to_string()))
    }
}

impl From<Option<&str>> for ClassEntry {
    fn from(class: Option<&str>) -> Self {
        Self::Static(class.map(str::to_string))
    }
}

impl From<Dependency<Option<String>>> for ClassEntry {
    fn from(dep: Dependency<Option<String>>) -> Self {
        Self::Reactive(dep)
    }
}

impl From<Dependency<String>> for ClassEntry {
    fn from(dep: Dependency<String>) -> Self {
        Self::Reactive(dep.derive(|s| Some(s.clone())))
    }
}

/// The `classList` option.
#[derive(Debug, Clone)]
pub enum ClassList {
    /// Class strings; each is split on whitespace.
    Static(Vec<String>),
    Reactive(Dependency<Vec<String>>),
    /// Literal and reactive entries mixed.
    Mixed(Vec<ClassEntry>),
}

impl From<&str> for ClassList {
    fn from(classes: &str) -> Self {
        Self::Static(vec![classes.to_string()])
    }
}

impl From<String> for ClassList {
    fn from(classes: String) -> Self {
        Self::Static(vec![classes])
    }
}

impl From<Vec<&str>> for ClassList {
    fn from(classes: Vec<&str>) -> Self {
        Self::Static(classes.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ClassList {
    fn from(classes: Vec<String>) -> Self {
        Self::Static(classes)
    }
}

impl From<Dependency<Vec<String>>> for ClassList {
    fn from(dep: Dependency<Vec<String>>) -> Self {
        Self::Reactive(dep)
    }
}

impl From<Dependency<String>> for ClassList {
    fn from(dep: Dependency<String>) -> Self {
        Self::Reactive(dep.derive(|s| vec![s.clone()]))
    }
}

impl From<Vec<ClassEntry>> for ClassList {
    fn from(entries: Vec<ClassEntry>) -> Self {
        Self::Mixed(entries)
    }
}

enum ClassSource {
    Fixed(Vec<String>),
    Live(Dependency<Vec<String>>),
}

impl ClassList {
    /// Collapse to a fixed list or a single dependency.
    fn into_source(self) -> ClassSource {
        let entries = match self {
            Self::Static(classes) => return ClassSource::Fixed(classes),
            Self::Reactive(dep) => return ClassSource::Live(dep),
            Self::Mixed(entries) => entries,
        };

        if entries.iter().all(|e| matches!(e, ClassEntry::Static(_))) {
            return ClassSource::Fixed(entries
                .into_iter()
                .filter_map(|e| match e {
                    ClassEntry::Static(class) => class,
                    ClassEntry::Reactive(_) => None,
                })
                .collect());
        }

        let read = Arc::new(entries);
        let watch = Arc::clone(&read);
        ClassSource::Live(Dependency::from_fns(
            move || {
                let mut classes = Vec::with_capacity(read.len());
                for entry in read.iter() {
                    let class = match entry {
                        ClassEntry::Static(class) => class.clone(),
                        ClassEntry::Reactive(dep) => dep.get()?,
                    };
                    classes.extend(class);
                }
                Ok(classes)
            },
            |_| Err(FluxelError::derived_read_only()),
            move |l| {
                Subscription::merge(
                    watch
                        .iter()
                        .filter_map(|entry| match entry {
                            ClassEntry::Reactive(dep) => Some(dep.subscribe(Arc::clone(&l))),
                            ClassEntry::Static(_) => None,
                        })
                        .collect(),
                )
            },
        ))
    }
}

// ----------------------------------------------------------------------------
// Props
// ----------------------------------------------------------------------------

/// Options for one element.
#[derive(Debug, Clone, Default)]
pub struct Props {
    children: Option<Child>,
    attrs: IndexMap<String, PropValue>,
    style: IndexMap<String, AttrValue>,
    class_list: Option<ClassList>,
    dataset: IndexMap<String, AttrValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(mut self, children: impl Into<Child>) -> Self {
        self.children = Some(children.into());
        self
    }

    /// Set an attribute. `on*` keys must hold handlers.
    pub fn attr(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Add a handler under an `on*` key, e.g. `onClick`.
    pub fn on(mut self, key: &str, handler: EventHandler) -> Self {
        match self.attrs.get_mut(key) {
            Some(PropValue::Handler(handlers)) => handlers.push(handler),
            _ => {
                self.attrs
                    .insert(key.to_string(), PropValue::Handler(vec![handler]));
            }
        }
        self
    }

    pub fn style(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.style.insert(key.to_string(), value.into());
        self
    }

    pub fn class_list(mut self, classes: impl Into<ClassList>) -> Self {
        self.class_list = Some(classes.into());
        self
    }

    pub fn data(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.dataset.insert(key.to_string(), value.into());
        self
    }
}

/// The second argument of [`build`]: bare children or full props.
#[derive(Debug, Clone)]
pub enum ElementSpec {
    Children(Child),
    Props(Props),
}

impl From<Props> for ElementSpec {
    fn from(props: Props) -> Self {
        Self::Props(props)
    }
}

impl From<Child> for ElementSpec {
    fn from(child: Child) -> Self {
        Self::Children(child)
    }
}

impl From<&str> for ElementSpec {
    fn from(text: &str) -> Self {
        Self::Children(Child::from(text))
    }
}

impl From<String> for ElementSpec {
    fn from(text: String) -> Self {
        Self::Children(Child::from(text))
    }
}

impl From<NodeId> for ElementSpec {
    fn from(node: NodeId) -> Self {
        Self::Children(Child::from(node))
    }
}

impl From<Vec<Child>> for ElementSpec {
    fn from(children: Vec<Child>) -> Self {
        Self::Children(Child::from(children))
    }
}

impl From<Vec<NodeId>> for ElementSpec {
    fn from(children: Vec<NodeId>) -> Self {
        Self::Children(Child::from(children))
    }
}

impl<T> From<Dependency<T>> for ElementSpec
where
    T: Into<ChildValue> + Clone + Send + Sync + 'static,
{
    fn from(dep: Dependency<T>) -> Self {
        Self::Children(Child::from(dep))
    }
}

// ----------------------------------------------------------------------------
// Building
// ----------------------------------------------------------------------------

/// Build an element of `tag`.
pub fn build(ctx: &RenderContext, tag: &str, spec: impl Into<ElementSpec>) -> Result<NodeId> {
    validate_tag(tag)?;
    let props = match spec.into() {
        ElementSpec::Children(children) => Props::new().children(children),
        ElementSpec::Props(props) => props,
    };
    if props.attrs.contains_key("textContent") {
        return Err(FluxelError::TextContentAttribute);
    }

    let (node, adopted) = ctx.create_element(tag)?;
    apply_props(ctx.document(), node, adopted, props)?;
    tracing::trace!(tag, ?node, adopted, "built element");
    Ok(node)
}

/// Apply `props` to every element among `children` and hand the children
/// back for an enclosing element to mount.
///
/// Reactive entries stay reactive: the element the fragment is mounted in
/// subscribes to them like to any other child. Props reach the elements a
/// reactive entry yields at the time the fragment is created.
pub fn fragment(ctx: &RenderContext, children: impl Into<Child>, props: Props) -> Result<Child> {
    if props.attrs.contains_key("textContent") {
        return Err(FluxelError::TextContentAttribute);
    }
    let props = Props {
        children: None,
        ..props
    };

    let children = children.into();
    let doc = ctx.document();
    let normalized = normalize(doc, &children)?;
    for node in normalized.nodes {
        if doc.tag(node).is_some() {
            apply_props(doc, node, ctx.is_hydrating(), props.clone())?;
        } else {
            // Text is recreated by whoever mounts the fragment.
            doc.release_owned(node);
        }
    }
    Ok(children)
}

fn validate_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(FluxelError::InvalidTagName(tag.to_string()))
    }
}

fn apply_props(doc: &Document, node: NodeId, adopted: bool, props: Props) -> Result<()> {
    let Props {
        children,
        mut attrs,
        style,
        class_list,
        dataset,
    } = props;

    if attrs.contains_key("textContent") {
        return Err(FluxelError::TextContentAttribute);
    }

    // Children
    let children = children.unwrap_or_default();
    let normalized = normalize(doc, &children)?;

    // Event handlers
    let mut events: IndexMap<String, Vec<EventHandler>> = IndexMap::new();
    let on_keys: Vec<String> = attrs
        .keys()
        .filter(|k| is_event_key(k))
        .cloned()
        .collect();
    for key in on_keys {
        match attrs.shift_remove(&key) {
            Some(PropValue::Handler(handlers)) => events
                .entry(key[2..].to_ascii_lowercase())
                .or_default()
                .extend(handlers),
            Some(PropValue::Static(Value::Null | Value::Bool(false))) | None => {}
            Some(_) => return Err(FluxelError::InvalidEventHandler { key }),
        }
    }

    // Style
    for (key, value) in style {
        match value {
            AttrValue::Static(value) if !adopted => doc.set_style(node, &key, css_value(&value).as_deref())?,
            AttrValue::Static(_) => {}
            AttrValue::Reactive(dep) => {
                let name = key.clone();
                bind(doc, node, &dep, adopted, move |doc, value| {
                    doc.set_style(node, &name, css_value(&value).as_deref())
                })?;
            }
        }
    }

    // Class list
    if let Some(class_list) = class_list {
        match class_list.into_source() {
            ClassSource::Fixed(classes) if !adopted => {
                for class in class_names(&classes) {
                    doc.add_class(node, &class)?;
                }
            }
            ClassSource::Fixed(_) => {}
            ClassSource::Live(dep) => {
                if !adopted {
                    for class in class_names(&dep.get()?) {
                        doc.add_class(node, &class)?;
                    }
                }
                bind(doc, node, &dep, true, move |doc, classes| {
                    doc.set_classes(node, class_names(&classes))
                })?;
            }
        }
    }
    attrs.shift_remove("className");

    // Dataset
    for (key, value) in dataset {
        match value {
            AttrValue::Static(value) if !adopted => apply_data(doc, node, &key, &value)?,
            AttrValue::Static(_) => {}
            AttrValue::Reactive(dep) => {
                let name = key.clone();
                bind(doc, node, &dep, adopted, move |doc, value| {
                    apply_data(doc, node, &name, &value)
                })?;
            }
        }
    }

    // Reactive, then plain attributes
    let mut plain = Vec::new();
    for (key, value) in attrs {
        match value {
            PropValue::Reactive(dep) => {
                let name = key.clone();
                bind(doc, node, &dep, adopted, move |doc, value| {
                    doc.set_property(node, &name, value)
                })?;
            }
            PropValue::Static(value) => plain.push((key, value)),
            PropValue::Handler(_) => {
                tracing::warn!(key = %key, "dropping function-typed attribute that is not an event handler");
            }
        }
    }
    if !adopted {
        for (key, value) in plain {
            doc.set_property(node, &key, value)?;
        }
    }

    attach_children(doc, node, adopted, &normalized)?;
    if normalized.variable_length {
        bind_variable_children(doc, node, &children);
    } else {
        for slot in normalized.slots {
            bind_slot(doc, node, slot);
        }
    }

    for (event, handlers) in events {
        for handler in handlers {
            doc.add_event_listener(node, &event, handler, ListenerOptions { passive: true })?;
        }
    }
    Ok(())
}

fn is_event_key(key: &str) -> bool {
    key.len() > 2 && key.starts_with("on")
}

fn attach_children(doc: &Document, node: NodeId, adopted: bool, normalized: &Normalized) -> Result<()> {
    if !adopted {
        for child in &normalized.nodes {
            doc.append_child(node, *child)?;
        }
        return Ok(());
    }

    if normalized.nodes.is_empty() {
        return Ok(());
    }
    if normalized.is_text_only(doc) {
        doc.replace_children(node, &normalized.nodes)
    } else {
        reconcile_children(doc, node, &normalized.nodes).map(|_| ())
    }
}

/// Subscribe `patch` to `dep` and register the subscription under `node`.
/// Unless `skip_seed` is set, `patch` also runs once with the current value.
fn bind<T, F>(doc: &Document, node: NodeId, dep: &Dependency<T>, skip_seed: bool, patch: F) -> Result<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Document, T) -> Result<()> + Send + Sync + 'static,
{
    if !skip_seed {
        patch(doc, dep.get()?)?;
    }

    let weak = doc.downgrade();
    let reader = dep.clone();
    let subscription = dep.subscribe(listener(move || {
        let Some(doc) = weak.upgrade() else {
            return;
        };
        if let Err(err) = reader.get().and_then(|value| patch(&doc, value)) {
            tracing::error!(?node, error = %err, "reactive update failed");
        }
    }));
    doc.lifecycle().register_subscription(node, subscription);
    Ok(())
}

fn bind_variable_children(doc: &Document, node: NodeId, children: &Child) {
    let weak = doc.downgrade();
    let spec = children.clone();
    let update = listener(move || {
        if let Err(err) = refresh_children(&weak, node, &spec) {
            tracing::error!(?node, error = %err, "children update failed");
        }
    });

    for dep in reactive_deps(children) {
        let subscription = dep.subscribe(Arc::clone(&update));
        doc.lifecycle().register_subscription(node, subscription);
    }
}

fn refresh_children(weak: &WeakDocument, node: NodeId, spec: &Child) -> Result<()> {
    let Some(doc) = weak.upgrade() else {
        return Ok(());
    };
    let after = normalize(&doc, spec)?;
    reconcile_children(&doc, node, &after.nodes)?;
    Ok(())
}

fn bind_slot(doc: &Document, parent: NodeId, slot: Slot) {
    let weak = doc.downgrade();
    let reader = slot.dep.clone();
    let current = Arc::new(Mutex::new(slot.node));
    let position = slot.position;

    let subscription = slot.dep.subscribe(listener(move || {
        let Some(doc) = weak.upgrade() else {
            return;
        };
        let occupant = *current.lock();
        let result = reader.get().and_then(|value| match value {
            ChildValue::Text(text) if doc.text(occupant).is_some() => {
                doc.set_text(occupant, &text).map(|_| occupant)
            }
            ChildValue::Empty if doc.text(occupant).is_some() => {
                doc.set_text(occupant, "").map(|_| occupant)
            }
            value => {
                let next = slot_node(&doc, value)?;
                replace_slot(&doc, parent, occupant, next)?;
                Ok(next)
            }
        });

        match result {
            Ok(next) => *current.lock() = next,
            Err(err) => {
                tracing::error!(?parent, position, error = %err, "child slot update failed");
            }
        }
    }));
    doc.lifecycle().register_subscription(parent, subscription);
}

fn css_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn apply_data(doc: &Document, node: NodeId, key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => doc.remove_data(node, key),
        Value::String(s) => doc.set_data(node, key, s),
        other => doc.set_data(node, key, &other.to_string()),
    }
}

/// Split class strings on whitespace and drop duplicates.
fn class_names(classes: &[String]) -> IndexSet<String> {
    classes
        .iter()
        .flat_map(|c| c.split_whitespace())
        .map(str::to_string)
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::handler;
    use crate::reactive::{Cell, State, TaskQueue};
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn ctx() -> RenderContext {
        RenderContext::new(Document::new(), TaskQueue::new())
    }

    #[test]
    fn builds_text_children() {
        let ctx = ctx();
        let p = build(&ctx, "p", "hello").unwrap();
        assert_eq!(ctx.document().text_content(p), "hello");
        assert_eq!(ctx.document().tag(p).as_deref(), Some("p"));
    }

    #[test]
    fn rejects_bad_input() {
        let ctx = ctx();
        assert!(matches!(
            build(&ctx, "div", Props::new().attr("textContent", "x")),
            Err(FluxelError::TextContentAttribute)
        ));
        assert!(matches!(
            build(&ctx, "div", Props::new().attr("onClick", "not a function")),
            Err(FluxelError::InvalidEventHandler { key }) if key == "onClick"
        ));
        assert!(matches!(
            build(&ctx, "<div>", Props::new()),
            Err(FluxelError::InvalidTagName(_))
        ));
    }

    #[test]
    fn event_handlers_attach_passively() {
        let ctx = ctx();
        let clicks = Arc::new(AtomicI32::new(0));
        let clicks_clone = clicks.clone();
        let button = build(
            &ctx,
            "button",
            Props::new().on(
                "onClick",
                handler(move |_| {
                    clicks_clone.fetch_add(1, Ordering::SeqCst);
                }),
            ),
        )
        .unwrap();

        ctx.document().dispatch_event(button, "click").unwrap();
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(
            ctx.document().listener_options(button, "click"),
            vec![ListenerOptions { passive: true }]
        );
    }

    #[test]
    fn function_typed_non_event_attribute_is_dropped() {
        let ctx = ctx();
        let div = build(
            &ctx,
            "div",
            Props::new()
                .attr("callback", handler(|_| {}))
                .attr("className", "ignored")
                .attr("id", "main"),
        )
        .unwrap();

        assert_eq!(ctx.document().property(div, "callback"), None);
        assert_eq!(ctx.document().property(div, "className"), None);
        assert_eq!(ctx.document().property(div, "id"), Some(json!("main")));
    }

    #[test]
    fn reactive_style_data_and_attribute_patch_in_place() {
        let ctx = ctx();
        let state = State::new(json!({ "color": "red", "id": "a", "n": 1 }), TaskQueue::new()).unwrap();
        let div = build(
            &ctx,
            "div",
            Props::new()
                .style("color", state.use_key("color"))
                .style("margin", "0")
                .data("count", state.use_key("n"))
                .attr("title", state.use_key("id")),
        )
        .unwrap();
        let doc = ctx.document();

        assert_eq!(doc.style(div, "color").as_deref(), Some("red"));
        assert_eq!(doc.data(div, "count").as_deref(), Some("1"));
        assert_eq!(doc.property(div, "title"), Some(json!("a")));

        state.set("color", "blue").unwrap();
        state.set("n", 2).unwrap();
        state.set("id", "b").unwrap();
        assert_eq!(doc.style(div, "color").as_deref(), Some("blue"));
        assert_eq!(doc.style(div, "margin").as_deref(), Some("0"));
        assert_eq!(doc.data(div, "count").as_deref(), Some("2"));
        assert_eq!(doc.property(div, "title"), Some(json!("b")));
        assert_eq!(doc.lifecycle().registered(div), 3);
    }

    #[test]
    fn mixed_class_list_rebuilds_on_change() {
        let ctx = ctx();
        let active = Cell::new(Some("active".to_string()));
        let div = build(
            &ctx,
            "div",
            Props::new().class_list(vec![
                ClassEntry::from("btn primary"),
                ClassEntry::from(None),
                ClassEntry::from(active.dependency()),
            ]),
        )
        .unwrap();
        let doc = ctx.document();
        assert_eq!(doc.classes(div), vec!["btn", "primary", "active"]);

        active.set(None);
        assert_eq!(doc.classes(div), vec!["btn", "primary"]);
    }

    #[test]
    fn reactive_text_child_updates_in_place() {
        let ctx = ctx();
        let state = State::new(json!({ "label": "one" }), TaskQueue::new()).unwrap();
        let span = build(&ctx, "span", state.use_key("label")).unwrap();
        let doc = ctx.document();
        let text = doc.children(span)[0];

        state.set("label", "two").unwrap();
        assert_eq!(doc.children(span), vec![text]);
        assert_eq!(doc.text(text).as_deref(), Some("two"));
    }

    #[test]
    fn reactive_list_reconciles_with_identity() {
        let ctx = ctx();
        let doc = ctx.document().clone();
        let items: Vec<NodeId> = (0..4).map(|i| build(&ctx, "li", format!("{i}")).unwrap()).collect();
        let shown = Cell::new(items[..3].to_vec());

        let ul = build(&ctx, "ul", shown.dependency()).unwrap();
        assert_eq!(doc.children(ul), &items[..3]);

        shown.set(items.clone());
        assert_eq!(doc.children(ul), items);

        shown.set(vec![items[3], items[0]]);
        assert_eq!(doc.children(ul), vec![items[3], items[0]]);
    }

    #[test]
    fn fixed_slot_replaces_only_its_position() {
        let ctx = ctx();
        let doc = ctx.document().clone();
        let x = build(&ctx, "b", "x").unwrap();
        let y = build(&ctx, "i", "y").unwrap();
        let first = build(&ctx, "em", "first").unwrap();
        let slot = Cell::new(x);

        let div = build(
            &ctx,
            "div",
            vec![Child::from(first), Child::from(slot.dependency()), Child::from("tail")],
        )
        .unwrap();
        let before = doc.children(div);
        assert_eq!(before[1], x);

        slot.set(y);
        let after = doc.children(div);
        assert_eq!(after, vec![before[0], y, before[2]]);
        assert_eq!(doc.parent(x), None);
    }

    #[test]
    fn fragment_applies_props_to_elements() {
        let ctx = ctx();
        let a = build(&ctx, "a", "1").unwrap();
        let b = build(&ctx, "a", "2").unwrap();
        let nodes = fragment(
            &ctx,
            vec![Child::from(a), Child::from("sep"), Child::from(b)],
            Props::new().class_list("link"),
        )
        .unwrap();
        let before = ctx.document().node_count();

        let nav = build(&ctx, "nav", nodes).unwrap();
        assert_eq!(ctx.document().child_count(nav), 3);
        assert_eq!(ctx.document().text_content(nav), "1sep2");
        assert!(ctx.document().has_class(a, "link"));
        assert!(ctx.document().has_class(b, "link"));
        // The nav and its one separator text node.
        assert_eq!(ctx.document().node_count(), before + 2);
    }

    #[test]
    fn fragment_children_stay_reactive() {
        let ctx = ctx();
        let state = State::new(json!({ "label": "one" }), ctx.queue().clone()).unwrap();

        let label = fragment(&ctx, state.use_key("label"), Props::new()).unwrap();
        let div = build(&ctx, "div", label).unwrap();
        assert_eq!(ctx.document().text_content(div), "one");
        assert_eq!(state.listener_count("label"), 1);

        state.set("label", "two").unwrap();
        assert_eq!(ctx.document().text_content(div), "two");
    }

    #[test]
    fn fragment_lists_reconcile_in_their_parent() {
        let ctx = ctx();
        let state = State::new(json!({ "items": ["a", "b"] }), ctx.queue().clone()).unwrap();

        let items = fragment(&ctx, state.use_key("items"), Props::new()).unwrap();
        let ul = build(&ctx, "ul", items).unwrap();
        state.set("items", json!(["a", "b", "c"])).unwrap();
        assert_eq!(ctx.document().text_content(ul), "abc");
        assert_eq!(ctx.document().child_count(ul), 3);
    }
}
