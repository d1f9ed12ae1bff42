//! Render Context
//!
//! Everything a component needs while it builds nodes travels in a
//! [`RenderContext`]: the document to build into, the task queue state
//! containers defer to, the render mode and the chain of provided values.
//! Components receive the context as a parameter and pass it down; there
//! is no ambient global.
//!
//! # Providers
//!
//! [`RenderContext::provide`] returns a child context whose lookups see the
//! new value first and fall back to the parent's chain. The parent is left
//! unchanged, so siblings rendered with the parent never see the value.
//!
//! # Element creation
//!
//! The builder asks the context for elements instead of the document:
//!
//! - `Client` creates a fresh element.
//! - `Server` creates one and, for reactive output, stamps it with its
//!   sequential eid.
//! - `Hydrate` looks up the server-rendered element carrying the next eid.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::{Document, NodeId};
use crate::error::{FluxelError, Result};
use crate::reactive::{State, TaskQueue};
use crate::ssr::ELEMENT_ID_KEY;

/// How elements are produced during a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Build a fresh tree.
    Client,
    /// Build a tree for serialization. `reactive` output carries eids.
    Server { reactive: bool },
    /// Attach to server-rendered markup.
    Hydrate,
}

/// Request location handed to server-rendered components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

#[derive(Debug)]
struct HydrationState {
    root: NodeId,
    active: AtomicBool,
}

struct Shared {
    document: Document,
    queue: TaskQueue,
    mode: RenderMode,
    hydration: Option<HydrationState>,
    /// Next eid to assign (server) or look up (hydrate).
    next_eid: AtomicUsize,
    styles: Mutex<Vec<String>>,
    next_unique: AtomicU64,
}

struct Provider {
    type_id: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Provider>>,
}

/// Explicit render-time context. Clones share the same render pass.
#[derive(Clone)]
pub struct RenderContext {
    shared: Arc<Shared>,
    providers: Option<Arc<Provider>>,
}

impl RenderContext {
    /// A client-mode context building into `document`.
    pub fn new(document: Document, queue: TaskQueue) -> Self {
        Self::with_mode(document, queue, RenderMode::Client, None)
    }

    pub(crate) fn server(document: Document, queue: TaskQueue, reactive: bool) -> Self {
        Self::with_mode(document, queue, RenderMode::Server { reactive }, None)
    }

    pub(crate) fn hydrating(document: Document, queue: TaskQueue, root: NodeId) -> Self {
        let hydration = HydrationState {
            root,
            active: AtomicBool::new(true),
        };
        Self::with_mode(document, queue, RenderMode::Hydrate, Some(hydration))
    }

    fn with_mode(
        document: Document,
        queue: TaskQueue,
        mode: RenderMode,
        hydration: Option<HydrationState>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                document,
                queue,
                mode,
                hydration,
                next_eid: AtomicUsize::new(0),
                styles: Mutex::new(Vec::new()),
                next_unique: AtomicU64::new(0),
            }),
            providers: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.shared.document
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.shared.queue
    }

    pub fn mode(&self) -> RenderMode {
        self.shared.mode
    }

    /// Whether the builder is currently attaching to existing markup.
    pub fn is_hydrating(&self) -> bool {
        self.shared
            .hydration
            .as_ref()
            .is_some_and(|h| h.active.load(Ordering::Acquire))
    }

    /// A child context in which `value` is the nearest `T`.
    pub fn provide<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            shared: Arc::clone(&self.shared),
            providers: Some(Arc::new(Provider {
                type_id: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.providers.clone(),
            })),
        }
    }

    /// The nearest enclosing value of type `T`.
    pub fn use_context<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let mut current = self.providers.as_ref();
        while let Some(provider) = current {
            if provider.type_id == TypeId::of::<T>() {
                return Arc::clone(&provider.value).downcast::<T>().ok();
            }
            current = provider.parent.as_ref();
        }
        None
    }

    /// The request location, when rendering on the server.
    pub fn location(&self) -> Option<Arc<Location>> {
        self.use_context::<Location>()
    }

    /// Queue CSS to ship alongside server output.
    pub fn forward_style(&self, css: impl Into<String>) {
        self.shared.styles.lock().push(css.into());
    }

    /// Every forwarded style sheet, newline separated.
    pub fn styles(&self) -> String {
        self.shared.styles.lock().join("\n")
    }

    /// A render-pass-unique id, e.g. `field-0`.
    ///
    /// Ids are sequential so a server pass and the hydrating pass over the
    /// same tree hand out the same values.
    pub fn unique_id(&self, prefix: &str) -> String {
        let n = self.shared.next_unique.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }

    /// Create a state container deferring to this context's queue.
    pub fn reactive<R, F>(&self, initial: Value, renderer: F) -> Result<R>
    where
        F: FnOnce(&State) -> R,
    {
        crate::reactive::reactive(initial, self.shared.queue.clone(), renderer)
    }

    /// Produce the element for the next builder call. The flag is `true`
    /// when the element was adopted from server markup.
    pub(crate) fn create_element(&self, tag: &str) -> Result<(NodeId, bool)> {
        let document = &self.shared.document;
        match self.shared.mode {
            RenderMode::Hydrate if self.is_hydrating() => {
                let eid = self.shared.next_eid.fetch_add(1, Ordering::Relaxed);
                let root = self
                    .shared
                    .hydration
                    .as_ref()
                    .map(|h| h.root)
                    .ok_or(FluxelError::HydrationElementMissing(eid))?;
                let node = document
                    .find_by_data(root, ELEMENT_ID_KEY, &eid.to_string())
                    .ok_or(FluxelError::HydrationElementMissing(eid))?;
                tracing::trace!(eid, ?node, "adopted server element");
                Ok((node, true))
            }
            RenderMode::Server { reactive: true } => {
                let node = document.create_element(tag);
                let eid = self.shared.next_eid.fetch_add(1, Ordering::Relaxed);
                document.set_data(node, ELEMENT_ID_KEY, &eid.to_string())?;
                Ok((node, false))
            }
            _ => Ok((document.create_element(tag), false)),
        }
    }

    /// Elements stamped (server) or adopted (hydrate) so far.
    pub(crate) fn element_count(&self) -> usize {
        self.shared.next_eid.load(Ordering::Relaxed)
    }

    /// Leave hydration mode; later builder calls create fresh elements.
    pub(crate) fn finish_hydration(&self) {
        if let Some(hydration) = &self.shared.hydration {
            hydration.active.store(false, Ordering::Release);
        }
    }
}

/// Wrap `renderer` as a component that owns a fresh state container per
/// call, seeded from the call's props by `initial`.
pub fn stateful_component<P, R, I, F>(
    initial: I,
    renderer: F,
) -> impl Fn(&RenderContext, P) -> Result<R>
where
    I: Fn(&P) -> Value,
    F: Fn(&RenderContext, P, &State) -> Result<R>,
{
    move |ctx: &RenderContext, props: P| {
        let seed = initial(&props);
        ctx.reactive(seed, |state| renderer(ctx, props, state))?
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut current = self.providers.as_ref();
        while let Some(provider) = current {
            depth += 1;
            current = provider.parent.as_ref();
        }
        f.debug_struct("RenderContext")
            .field("mode", &self.shared.mode)
            .field("hydrating", &self.is_hydrating())
            .field("providers", &depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RenderContext {
        RenderContext::new(Document::new(), TaskQueue::new())
    }

    #[derive(Debug, PartialEq)]
    struct Theme(&'static str);

    #[test]
    fn nearest_provider_wins() {
        let root = ctx();
        let outer = root.provide(Theme("light"));
        let inner = outer.provide(7_u32).provide(Theme("dark"));

        assert_eq!(root.use_context::<Theme>(), None);
        assert_eq!(*outer.use_context::<Theme>().unwrap(), Theme("light"));
        assert_eq!(*inner.use_context::<Theme>().unwrap(), Theme("dark"));
        assert_eq!(*inner.use_context::<u32>().unwrap(), 7);
        assert_eq!(outer.use_context::<u32>(), None);
    }

    #[test]
    fn unique_ids_are_sequential_per_render_pass() {
        let a = ctx();
        let child = a.provide(1_u8);
        assert_eq!(a.unique_id("f"), "f-0");
        assert_eq!(child.unique_id("f"), "f-1");
        assert_eq!(ctx().unique_id("f"), "f-0");
    }

    #[test]
    fn stateful_components_get_their_own_state() {
        let ctx = ctx();
        let counter = stateful_component(
            |start: &i64| json!({ "n": start }),
            |ctx: &RenderContext, _start: i64, state: &State| {
                let text = state.use_derived("n", |n, _| n.to_string());
                Ok((state.clone(), crate::render::build(ctx, "span", text)?))
            },
        );

        let (first, a) = counter(&ctx, 1).unwrap();
        let (_second, b) = counter(&ctx, 5).unwrap();
        first.set("n", 2).unwrap();

        assert_eq!(ctx.document().text_content(a), "2");
        assert_eq!(ctx.document().text_content(b), "5");
    }

    #[test]
    fn forwarded_styles_join_with_newlines() {
        let ctx = ctx();
        ctx.forward_style(".a{}");
        ctx.forward_style(".b{}".to_string());
        assert_eq!(ctx.styles(), ".a{}\n.b{}");
    }

    #[test]
    fn reactive_state_uses_context_queue() {
        let ctx = ctx();
        let state = ctx.reactive(json!({ "n": 1 }), |s| s.clone()).unwrap();
        state.schedule(|| {});
        assert_eq!(ctx.queue().pending(), 1);
    }

    #[test]
    fn server_mode_stamps_eids_only_when_reactive() {
        let doc = Document::new();
        let plain = RenderContext::server(doc.clone(), TaskQueue::new(), false);
        let (a, _) = plain.create_element("div").unwrap();
        assert_eq!(doc.data(a, ELEMENT_ID_KEY), None);

        let reactive = RenderContext::server(doc.clone(), TaskQueue::new(), true);
        let (b, _) = reactive.create_element("div").unwrap();
        let (c, _) = reactive.create_element("div").unwrap();
        assert_eq!(doc.data(b, ELEMENT_ID_KEY).as_deref(), Some("0"));
        assert_eq!(doc.data(c, ELEMENT_ID_KEY).as_deref(), Some("1"));
        assert_eq!(reactive.element_count(), 2);
    }

    #[test]
    fn hydrating_adopts_elements_by_eid() {
        let doc = Document::new();
        let root = doc.parse_html("<div data-fluxel-eid=\"0\"><p data-fluxel-eid=\"1\"></p></div>").unwrap()[0];
        let ctx = RenderContext::hydrating(doc.clone(), TaskQueue::new(), root);

        let (first, adopted) = ctx.create_element("div").unwrap();
        assert!(adopted);
        assert_eq!(first, root);
        let (second, _) = ctx.create_element("p").unwrap();
        assert_eq!(doc.parent(second), Some(root));
        assert!(matches!(
            ctx.create_element("span"),
            Err(FluxelError::HydrationElementMissing(2))
        ));

        ctx.finish_hydration();
        let (fresh, adopted) = ctx.create_element("span").unwrap();
        assert!(!adopted);
        assert_eq!(doc.parent(fresh), None);
        assert_eq!(doc.elements_created(), 1);
    }
}
