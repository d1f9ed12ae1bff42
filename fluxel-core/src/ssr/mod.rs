//! Server Rendering and Hydration
//!
//! [`render_to_string`] runs a renderer against a fresh document and
//! serializes the result. With `reactive` set, every element the builder
//! creates is stamped with a sequential `data-fluxel-eid` and the root
//! records how many were created, so that [`hydrate`] can later attach the
//! same renderer to the markup without creating any element.
//!
//! # Root attributes
//!
//! | Attribute              | Value                                 |
//! |------------------------|---------------------------------------|
//! | `data-fluxel-ssr`      | `"true"`                              |
//! | `data-fluxel-metadata` | [`SsrOptions::metadata`]              |
//! | `data-fluxel-e-count`  | elements created (reactive output only) |
//! | `data-fluxel-hydrated` | set to `"true"` by [`hydrate`]        |

mod hydrate;

pub use hydrate::{hydrate, HydrationSummary};

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::reactive::TaskQueue;
use crate::render::{Location, RenderContext};

pub const SSR_ATTRIBUTE: &str = "data-fluxel-ssr";
pub const METADATA_ATTRIBUTE: &str = "data-fluxel-metadata";
pub const ELEMENT_COUNT_ATTRIBUTE: &str = "data-fluxel-e-count";
pub const ELEMENT_ID_ATTRIBUTE: &str = "data-fluxel-eid";
pub const HYDRATED_ATTRIBUTE: &str = "data-fluxel-hydrated";

// Dataset keys of the attributes above.
pub(crate) const SSR_KEY: &str = "fluxelSsr";
pub(crate) const METADATA_KEY: &str = "fluxelMetadata";
pub(crate) const ELEMENT_COUNT_KEY: &str = "fluxelECount";
pub(crate) const ELEMENT_ID_KEY: &str = "fluxelEid";
pub(crate) const HYDRATED_KEY: &str = "fluxelHydrated";

/// Options for [`render_to_string`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrOptions {
    /// Stamp element ids so the output can be hydrated.
    pub reactive: bool,
    /// Opaque string stored on the root element.
    pub metadata: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl SsrOptions {
    /// The request location components see through the render context.
    pub fn location(&self) -> Location {
        Location {
            pathname: self.pathname.clone(),
            search: self.search.clone(),
            hash: self.hash.clone(),
        }
    }
}

/// Serialized server output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrOutput {
    pub dom: String,
    /// Style sheets forwarded during rendering, newline separated.
    pub style: String,
}

/// Render `renderer` on a fresh document and serialize its root.
pub fn render_to_string<F>(renderer: F, options: &SsrOptions) -> Result<SsrOutput>
where
    F: FnOnce(&RenderContext) -> Result<NodeId>,
{
    let document = Document::new();
    let ctx = RenderContext::server(document.clone(), TaskQueue::new(), options.reactive)
        .provide(options.location());

    let root = renderer(&ctx)?;
    if document.tag(root).is_some() {
        document.set_data(root, SSR_KEY, "true")?;
        document.set_data(root, METADATA_KEY, &options.metadata)?;
        if options.reactive {
            document.set_data(root, ELEMENT_COUNT_KEY, &ctx.element_count().to_string())?;
        }
    }

    let dom = document.outer_html(root)?;
    tracing::debug!(
        reactive = options.reactive,
        elements = document.elements_created(),
        bytes = dom.len(),
        "rendered to string"
    );
    Ok(SsrOutput {
        dom,
        style: ctx.styles(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::build;
    use serde_json::json;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SsrOptions = serde_json::from_value(json!({
            "reactive": true,
            "pathname": "/a"
        }))
        .unwrap();

        assert!(options.reactive);
        assert_eq!(options.metadata, "");
        assert_eq!(options.location().pathname, "/a");
    }

    #[test]
    fn reactive_output_carries_eids_and_count() {
        let out = render_to_string(
            |ctx| {
                let item = build(ctx, "li", "one")?;
                build(ctx, "ul", vec![item])
            },
            &SsrOptions {
                reactive: true,
                metadata: "m".into(),
                ..SsrOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            out.dom,
            "<ul data-fluxel-eid=\"1\" data-fluxel-ssr=\"true\" data-fluxel-metadata=\"m\" \
             data-fluxel-e-count=\"2\"><li data-fluxel-eid=\"0\">one</li></ul>"
        );
        assert_eq!(out.style, "");
    }

    #[test]
    fn plain_output_has_no_eids() {
        let out = render_to_string(
            |ctx| {
                ctx.forward_style(".x{}");
                let path = ctx.location().map(|l| l.pathname.clone()).unwrap_or_default();
                build(ctx, "p", path)
            },
            &SsrOptions {
                pathname: "/home".into(),
                ..SsrOptions::default()
            },
        )
        .unwrap();

        assert!(!out.dom.contains(ELEMENT_ID_ATTRIBUTE));
        assert!(!out.dom.contains(ELEMENT_COUNT_ATTRIBUTE));
        assert!(out.dom.contains(SSR_ATTRIBUTE));
        assert!(out.dom.contains(">/home</p>"));
        assert_eq!(out.style, ".x{}");
    }
}
