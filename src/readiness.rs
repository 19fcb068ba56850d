//! Pre-capture image resolution for one section.
//!
//! Every `img` under the section is fetched and decoded concurrently, then
//! the store is updated and each element's `src` is swapped to the stable
//! resource handle the painter understands. A failed image never aborts the
//! export; it is reported and the section captures without it.

use futures_util::future::join_all;
use kuchiki::NodeRef;

use crate::resources::{RESOURCE_SCHEME, ResourceStore, decode_source, truncate_src};
use crate::surface::SectionReadiness;

pub(crate) struct PendingImage {
    pub node: NodeRef,
    pub src: String,
}

/// Collects `img` elements under `root` whose sources have not been resolved
/// to store handles yet.
pub(crate) fn pending_images(root: &NodeRef) -> Vec<PendingImage> {
    let mut out = Vec::new();
    let Ok(images) = root.select("img") else {
        return out;
    };
    for image in images {
        let src = {
            let attributes = image.attributes.borrow();
            match attributes.get("src") {
                Some(src) if !src.is_empty() && !src.starts_with(RESOURCE_SCHEME) => {
                    src.to_string()
                }
                _ => continue,
            }
        };
        out.push(PendingImage {
            node: image.as_node().clone(),
            src,
        });
    }
    out
}

/// Decodes every pending image and swaps its `src` to the store handle.
pub(crate) async fn resolve_images(
    section_key: &str,
    pending: Vec<PendingImage>,
    store: &mut ResourceStore,
) -> SectionReadiness {
    if pending.is_empty() {
        return SectionReadiness::default();
    }

    let decoded = join_all(pending.iter().map(|image| {
        let src = image.src.clone();
        async move { decode_source(&src) }
    }))
    .await;

    let mut readiness = SectionReadiness::default();
    for (image, outcome) in pending.into_iter().zip(decoded) {
        match outcome {
            Ok(stored) => {
                let handle = store.insert(section_key, stored);
                if let Some(el) = image.node.as_element() {
                    el.attributes.borrow_mut().insert("src", handle);
                }
                readiness.resolved += 1;
            }
            Err(err) => {
                readiness
                    .failures
                    .push(format!("{}: {err}", truncate_src(&image.src)));
            }
        }
    }
    readiness
}
