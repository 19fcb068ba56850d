//! Seam between the export pipeline and a concrete document host.

use crate::document::ExportDocument;
use crate::error::ExportError;
use crate::settle::SettleOutcome;

/// One captured section bitmap. Rows run top to bottom, four bytes per pixel
/// (RGBA, opaque).
#[derive(Debug, Clone)]
pub struct Raster {
    pub width_px: u32,
    pub height_px: u32,
    pub pixels: Vec<u8>,
}

/// What became of a section's images during preparation.
#[derive(Debug, Clone, Default)]
pub struct SectionReadiness {
    /// Images that decoded and are ready to paint.
    pub resolved: usize,
    /// One message per image that failed; capture proceeds without them.
    pub failures: Vec<String>,
}

impl SectionReadiness {
    pub fn all_ready(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A host that can mount an [`ExportDocument`], settle it, and hand back
/// per-section bitmaps.
///
/// The pipeline calls these in a fixed order: `mount`, `stabilize`, `reveal`,
/// then per capture target `prepare_section` followed by `capture_section`,
/// and finally `unmount`. `unmount` runs exactly once per successful mount,
/// also when a capture fails partway.
// Futures here are driven on a current-thread runtime; no Send bound is wanted.
#[allow(async_fn_in_trait)]
pub trait RenderSurface {
    /// Builds/attaches the document so its sections can be measured.
    async fn mount(&mut self, document: &ExportDocument) -> Result<(), ExportError>;

    /// Waits for fonts and layout to go quiet. A [`SettleOutcome::BudgetExhausted`]
    /// is reported, not fatal: capture continues with whatever has settled.
    async fn stabilize(&mut self) -> SettleOutcome;

    /// Makes the mounted content visible for capture.
    async fn reveal(&mut self);

    /// Capture target keys in document order. Hosts with no marked sections
    /// return a single whole-document target.
    fn capture_targets(&self) -> Vec<String>;

    /// Resolves and decodes the images inside one target.
    async fn prepare_section(&mut self, key: &str) -> SectionReadiness;

    /// Renders one target to a bitmap at the host's supersample factor.
    async fn capture_section(&mut self, key: &str) -> Result<Raster, ExportError>;

    /// Tears the mounted document down and releases its resources.
    async fn unmount(&mut self);
}
