//! Built-in render surface with no browser behind it.
//!
//! The document mounts into a hidden kuchiki DOM at a fixed logical width.
//! Layout and painting are synchronous, so the settle waits all poll the same
//! DOM revision counter and go quiet as soon as nothing mutates; the policy
//! budgets only cap how long a wait may take.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;

use crate::config::ExportConfig;
use crate::document::ExportDocument;
use crate::error::ExportError;
use crate::font::FontBook;
use crate::layout::layout_section;
use crate::raster::rasterize;
use crate::readiness::{pending_images, resolve_images};
use crate::resources::ResourceStore;
use crate::settle::{SettleOutcome, SettlePolicy, wait_quiescent};
use crate::surface::{Raster, RenderSurface, SectionReadiness};

/// Capture target used when the mounted markup carries no section markers.
pub const WHOLE_DOCUMENT_TARGET: &str = "document";

pub struct HeadlessSurface {
    width_px: u32,
    supersample: u32,
    settle: SettlePolicy,
    fonts: Arc<FontBook>,
    store: ResourceStore,
    container: Option<NodeRef>,
    revealed: bool,
    revision: Cell<u64>,
}

impl HeadlessSurface {
    pub fn new(config: &ExportConfig, settle: SettlePolicy, fonts: Arc<FontBook>) -> Self {
        Self {
            width_px: config.surface_width_px,
            supersample: config.supersample,
            settle,
            fonts,
            store: ResourceStore::new(),
            container: None,
            revealed: false,
            revision: Cell::new(0),
        }
    }

    fn bump(&self) {
        self.revision.set(self.revision.get() + 1);
    }

    async fn wait(&self, budget: Duration) -> SettleOutcome {
        let revision = &self.revision;
        wait_quiescent(&self.settle, budget, || revision.get()).await
    }

    fn target_node(&self, key: &str) -> Option<NodeRef> {
        let container = self.container.as_ref()?;
        if key == WHOLE_DOCUMENT_TARGET {
            return Some(container.clone());
        }
        let selector = format!("[data-pdf-section=\"{key}\"]");
        container
            .select_first(&selector)
            .ok()
            .map(|el| el.as_node().clone())
    }
}

impl RenderSurface for HeadlessSurface {
    async fn mount(&mut self, document: &ExportDocument) -> Result<(), ExportError> {
        let body = document.body_html();
        if body.is_empty() {
            return Err(ExportError::EmptyDocument);
        }
        let html = format!(
            "<div id=\"offprint-root\" style=\"width: {}px; opacity: 0;\">{}</div>",
            self.width_px, body
        );
        let dom = kuchiki::parse_html().one(html);
        let container = dom
            .select_first("#offprint-root")
            .map_err(|_| ExportError::Capture("container markup failed to parse".to_string()))?;
        self.container = Some(container.as_node().clone());
        self.revealed = false;
        self.bump();
        Ok(())
    }

    async fn stabilize(&mut self) -> SettleOutcome {
        let layout = self.wait(self.settle.layout_budget).await;
        let typeset = self.wait(self.settle.typeset_budget).await;
        if layout == SettleOutcome::BudgetExhausted || typeset == SettleOutcome::BudgetExhausted {
            SettleOutcome::BudgetExhausted
        } else {
            SettleOutcome::Quiet
        }
    }

    async fn reveal(&mut self) {
        if let Some(container) = &self.container {
            if let Some(el) = container.as_element() {
                el.attributes.borrow_mut().insert(
                    "style",
                    format!("width: {}px; opacity: 1;", self.width_px),
                );
            }
        }
        self.revealed = true;
        self.bump();
        let _ = self.wait(self.settle.reveal_paint).await;
    }

    fn capture_targets(&self) -> Vec<String> {
        let Some(container) = &self.container else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        if let Ok(sections) = container.select("[data-pdf-section]") {
            for section in sections {
                let attributes = section.attributes.borrow();
                if let Some(key) = attributes.get("data-pdf-section") {
                    if !key.is_empty() {
                        keys.push(key.to_string());
                    }
                }
            }
        }
        if keys.is_empty() {
            keys.push(WHOLE_DOCUMENT_TARGET.to_string());
        }
        keys
    }

    async fn prepare_section(&mut self, key: &str) -> SectionReadiness {
        let Some(target) = self.target_node(key) else {
            return SectionReadiness::default();
        };
        let pending = pending_images(&target);
        let readiness = resolve_images(key, pending, &mut self.store).await;
        if readiness.resolved > 0 {
            self.bump();
        }
        let _ = self.wait(self.settle.image_paint).await;
        readiness
    }

    async fn capture_section(&mut self, key: &str) -> Result<Raster, ExportError> {
        if self.container.is_none() {
            return Err(ExportError::Capture("no document mounted".to_string()));
        }
        if !self.revealed {
            return Err(ExportError::Capture("surface not revealed".to_string()));
        }
        let Some(target) = self.target_node(key) else {
            return Err(ExportError::Capture(format!(
                "unknown capture target: {key}"
            )));
        };

        // Page-break styles exist for the assembler, not the bitmap. Drop them
        // for the duration of the capture and restore the exact attribute after.
        let saved = save_style(&target);
        if key != WHOLE_DOCUMENT_TARGET {
            set_style(
                &target,
                Some(neutralize_break_styles(saved.as_deref().unwrap_or(""))),
            );
            self.bump();
        }
        let _ = self.wait(self.settle.pre_capture).await;

        let list = layout_section(&target, self.width_px as f32, &self.fonts, &self.store);
        let raster = rasterize(&list, self.supersample, &self.fonts, &self.store);

        if key != WHOLE_DOCUMENT_TARGET {
            set_style(&target, saved);
            self.bump();
        }
        self.store.revoke_section(key);
        raster
    }

    async fn unmount(&mut self) {
        self.container = None;
        self.revealed = false;
        self.store.revoke_all();
        self.bump();
    }
}

fn save_style(node: &NodeRef) -> Option<String> {
    node.as_element()
        .and_then(|el| el.attributes.borrow().get("style").map(str::to_string))
}

fn set_style(node: &NodeRef, style: Option<String>) {
    let Some(el) = node.as_element() else {
        return;
    };
    let mut attributes = el.attributes.borrow_mut();
    match style {
        Some(value) => {
            attributes.insert("style", value);
        }
        None => {
            attributes.remove("style");
        }
    }
}

/// Strips `break-before`/`page-break-before` and `margin-top` declarations,
/// then pins `margin-top: 0` so the captured bitmap starts at the content.
fn neutralize_break_styles(style: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for declaration in style.split(';') {
        let trimmed = declaration.trim();
        if trimmed.is_empty() {
            continue;
        }
        let name = trimmed
            .split_once(':')
            .map(|(name, _)| name.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if name == "break-before" || name == "page-break-before" || name == "margin-top" {
            continue;
        }
        kept.push(trimmed);
    }
    let mut out = kept.join("; ");
    if !out.is_empty() {
        out.push_str("; ");
    }
    out.push_str("margin-top: 0");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Section, SectionKind};

    fn surface(width: u32) -> HeadlessSurface {
        let config = ExportConfig {
            surface_width_px: width,
            supersample: 1,
            ..ExportConfig::default()
        };
        HeadlessSurface::new(&config, SettlePolicy::instant(), Arc::new(FontBook::new()))
    }

    fn single_section(kind: SectionKind, html: &str) -> ExportDocument {
        ExportDocument {
            sections: vec![Section {
                kind,
                html: html.to_string(),
                images: Vec::new(),
                include: true,
            }],
        }
    }

    #[tokio::test]
    async fn mount_lists_marked_sections_in_order() {
        let mut surface = surface(100);
        let document = ExportDocument {
            sections: vec![
                Section {
                    kind: SectionKind::Question,
                    html: r#"<div data-pdf-section="question">q</div>"#.to_string(),
                    images: Vec::new(),
                    include: true,
                },
                Section {
                    kind: SectionKind::Chat,
                    html: r#"<div data-pdf-section="chat">c</div>"#.to_string(),
                    images: Vec::new(),
                    include: true,
                },
            ],
        };
        surface.mount(&document).await.unwrap();
        assert_eq!(surface.capture_targets(), vec!["question", "chat"]);
    }

    #[tokio::test]
    async fn unmarked_markup_falls_back_to_whole_document() {
        let mut surface = surface(100);
        let document = single_section(SectionKind::Question, "<div>unmarked</div>");
        surface.mount(&document).await.unwrap();
        assert_eq!(surface.capture_targets(), vec![WHOLE_DOCUMENT_TARGET]);
    }

    #[tokio::test]
    async fn mounting_an_empty_document_fails() {
        let mut surface = surface(100);
        let document = ExportDocument {
            sections: Vec::new(),
        };
        let err = surface.mount(&document).await.unwrap_err();
        assert!(matches!(err, ExportError::EmptyDocument));
    }

    #[tokio::test]
    async fn capture_requires_reveal() {
        let mut surface = surface(100);
        let document = single_section(
            SectionKind::Question,
            r#"<div data-pdf-section="question">q</div>"#,
        );
        surface.mount(&document).await.unwrap();
        let err = surface.capture_section("question").await.unwrap_err();
        assert!(matches!(err, ExportError::Capture(_)));
    }

    #[tokio::test]
    async fn capture_restores_break_styles_exactly() {
        let original = "page-break-before: always; margin-top: 20px; font-size: 10px";
        let html = format!(r#"<div data-pdf-section="chat" style="{original}">hi</div>"#);
        let document = single_section(SectionKind::Chat, &html);

        let mut surface = surface(100);
        surface.mount(&document).await.unwrap();
        surface.stabilize().await;
        surface.reveal().await;
        let raster = surface.capture_section("chat").await.unwrap();
        assert_eq!(raster.width_px, 100);
        assert!(raster.height_px >= 12);

        let target = surface.target_node("chat").unwrap();
        let el = target.as_element().unwrap();
        let attributes = el.attributes.borrow();
        assert_eq!(attributes.get("style"), Some(original));
    }

    #[tokio::test]
    async fn prepare_resolves_section_images() {
        let uri = crate::resources::tests::png_data_uri(5, 5);
        let html = format!(r#"<div data-pdf-section="question"><img src="{uri}"></div>"#);
        let document = single_section(SectionKind::Question, &html);

        let mut surface = surface(100);
        surface.mount(&document).await.unwrap();
        surface.reveal().await;
        let readiness = surface.prepare_section("question").await;
        assert_eq!(readiness.resolved, 1);
        assert!(readiness.all_ready());

        let target = surface.target_node("question").unwrap();
        let image = target.select_first("img").unwrap();
        let attributes = image.attributes.borrow();
        assert!(attributes.get("src").unwrap().starts_with("resource:"));

        let raster = surface.capture_section("question").await.unwrap();
        assert!(raster.height_px >= 5);
    }

    #[tokio::test]
    async fn unmount_clears_targets_and_allows_remount() {
        let mut surface = surface(100);
        let document = single_section(
            SectionKind::Question,
            r#"<div data-pdf-section="question">q</div>"#,
        );
        surface.mount(&document).await.unwrap();
        surface.unmount().await;
        assert!(surface.capture_targets().is_empty());
        surface.mount(&document).await.unwrap();
        assert_eq!(surface.capture_targets(), vec!["question"]);
    }

    #[test]
    fn neutralize_drops_break_and_margin_declarations() {
        let out = neutralize_break_styles("page-break-before: always; margin-top: 20px; color: #111");
        assert_eq!(out, "color: #111; margin-top: 0");
        assert_eq!(neutralize_break_styles(""), "margin-top: 0");
        assert_eq!(
            neutralize_break_styles("break-before: page"),
            "margin-top: 0"
        );
    }
}
