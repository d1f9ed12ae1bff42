//! Hydration
//!
//! Attaches a renderer to server markup that has already been parsed into
//! a [`Document`]. The renderer runs with a hydrating [`RenderContext`]:
//! each builder call adopts the element carrying the next eid instead of
//! creating one, so the pass rebuilds the subscriptions without touching
//! the structure the server produced.

use crate::dom::{Document, NodeId};
use crate::error::{FluxelError, Result};
use crate::reactive::TaskQueue;
use crate::render::RenderContext;

use super::{ELEMENT_COUNT_KEY, HYDRATED_KEY, SSR_KEY};

/// Outcome of a [`hydrate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationSummary {
    /// The SSR root that was hydrated.
    pub root: NodeId,
    /// What the renderer returned, or `None` when hydration was skipped.
    pub rendered: Option<NodeId>,
    /// Element count recorded by the server.
    pub expected: usize,
    /// Elements the renderer adopted.
    pub adopted: usize,
}

impl HydrationSummary {
    pub fn is_complete(&self) -> bool {
        self.rendered.is_some() && self.expected == self.adopted
    }
}

/// Run `renderer` against the server markup at `element`.
///
/// `element` is either the SSR root or its parent. State containers the
/// renderer creates through the context defer to `queue`.
///
/// Fails before any mutation when the root or its element count is
/// missing. A renderer error is wrapped in [`FluxelError::Hydration`]. An
/// element count that differs from the server's is logged, not returned.
pub fn hydrate<F>(
    document: &Document,
    queue: &TaskQueue,
    element: NodeId,
    renderer: F,
) -> Result<HydrationSummary>
where
    F: FnOnce(&RenderContext) -> Result<NodeId>,
{
    let root = find_root(document, element)?;
    let raw_count = document.data(root, ELEMENT_COUNT_KEY);

    if document.data(root, HYDRATED_KEY).as_deref() == Some("true") {
        tracing::warn!(?root, "element is already hydrated, skipping");
        return Ok(HydrationSummary {
            root,
            rendered: None,
            expected: raw_count.and_then(|c| c.parse().ok()).unwrap_or_default(),
            adopted: 0,
        });
    }

    let expected: usize = raw_count
        .as_deref()
        .and_then(|c| c.trim().parse().ok())
        .ok_or_else(|| FluxelError::InvalidElementCount(raw_count.clone()))?;

    let ctx = RenderContext::hydrating(document.clone(), queue.clone(), root);
    let rendered = renderer(&ctx);
    ctx.finish_hydration();

    let rendered = match rendered {
        Ok(node) => node,
        Err(err) => {
            tracing::error!(?root, error = %err, "error during hydration");
            return Err(FluxelError::Hydration {
                source: Box::new(err),
            });
        }
    };

    document.set_data(root, HYDRATED_KEY, "true")?;

    let adopted = ctx.element_count();
    if adopted != expected {
        tracing::error!(
            expected,
            adopted,
            "hydration count mismatch; the renderer may not match the server output \
             or the markup changed after rendering"
        );
    } else {
        tracing::debug!(?root, adopted, "hydrated");
    }

    Ok(HydrationSummary {
        root,
        rendered: Some(rendered),
        expected,
        adopted,
    })
}

fn find_root(document: &Document, element: NodeId) -> Result<NodeId> {
    if !document.contains(element) {
        return Err(FluxelError::UnknownNode(element));
    }

    let root = if document.data(element, SSR_KEY).is_some() {
        element
    } else {
        document
            .children(element)
            .into_iter()
            .find(|child| document.data(*child, SSR_KEY).is_some())
            .ok_or(FluxelError::NotSsrElement)?
    };

    match document.data(root, SSR_KEY).as_deref() {
        Some("true") => Ok(root),
        _ => Err(FluxelError::NotSsrElement),
    }
}
