mod archive;
mod assemble;
mod config;
mod content;
mod debug;
mod document;
mod error;
mod filename;
mod font;
mod geom;
mod headless;
mod layout;
mod pdf;
mod pipeline;
mod proof;
mod raster;
mod readiness;
mod resources;
mod settle;
mod surface;

pub use archive::{ARCHIVE_PREFIX, ArchiveSink, ArchivedExport, FsArchive, MemoryArchive};
use config::validate_export_config;
pub use config::{ExportConfig, ExportOptions};
pub use content::{ChatRole, ChatTurn, ExamContent, ExamMetadata, ExamPart, GradingResult};
use debug::DebugLogger;
pub use document::{ExportDocument, Section, SectionKind, build_document};
pub use error::ExportError;
pub use filename::export_filename;
use font::FontBook;
pub use geom::{Mm, MmRect, PageFormat, PageGeometry, PagePlan};
pub use headless::HeadlessSurface;
pub use offprint_archive_contract::{
    ArchiveRecord, ContractViolation, contract_fingerprint_sha256, hex_sha256,
};
pub use proof::{
    PdfProof, ProofCode, ProofError, proof_issues, proof_pdf_bytes, proof_pdf_path,
    require_clean_proof,
};
pub use settle::{SettleOutcome, SettlePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
pub use surface::{Raster, RenderSurface, SectionReadiness};

#[derive(Debug)]
pub struct Offprint {
    config: ExportConfig,
    settle: SettlePolicy,
    fonts: Arc<FontBook>,
    debug: Option<DebugLogger>,
}

#[derive(Clone)]
pub struct OffprintBuilder {
    config: ExportConfig,
    settle: SettlePolicy,
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<Vec<u8>>,
    debug_path: Option<PathBuf>,
}

impl Offprint {
    pub fn builder() -> OffprintBuilder {
        OffprintBuilder::new()
    }

    pub async fn export(
        &self,
        content: &ExamContent,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        let mut surface = HeadlessSurface::new(&self.config, self.settle, self.fonts.clone());
        self.export_with_surface(&mut surface, content, options)
            .await
    }

    // One export per surface lifetime: the pipeline mounts, captures, and
    // unmounts, so the caller hands over an idle surface and gets it back idle.
    pub async fn export_with_surface<S: RenderSurface>(
        &self,
        surface: &mut S,
        content: &ExamContent,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        pipeline::run_export(
            surface,
            &self.config,
            &self.fonts,
            self.debug.as_ref(),
            content,
            options,
        )
        .await
    }

    /// Export plus the canonical filename for the document.
    pub async fn export_named(
        &self,
        content: &ExamContent,
        options: &ExportOptions,
    ) -> Result<(String, Vec<u8>), ExportError> {
        let bytes = self.export(content, options).await?;
        let filename = export_filename(&self.config.product_label, &content.metadata);
        Ok((filename, bytes))
    }

    /// Archival export: render with archival options, verify the bytes read
    /// back with the declared page count, then hand the PDF and its catalog
    /// record to the sink. Returns the sink's locator for the stored export.
    pub async fn export_archive<A: ArchiveSink>(
        &self,
        content: &ExamContent,
        sink: &mut A,
    ) -> Result<String, ExportError> {
        let options = ExportOptions::archival();
        let bytes = self.export(content, &options).await?;

        let proof =
            proof_pdf_bytes(&bytes).map_err(|err| ExportError::Archive(err.to_string()))?;
        let document = build_document(content, &options, &self.config.product_label);
        require_clean_proof(&proof, document.included_count())
            .map_err(|err| ExportError::Archive(err.to_string()))?;

        let record = ArchiveRecord {
            kind_code: content.metadata.kind_code.clone(),
            unit: content.metadata.unit.clone(),
            topics: content.metadata.display_topic_ids().to_vec(),
            max_points: content.max_points,
            generated_at_ms: unix_millis(),
            page_count: proof.page_count as u64,
            pdf_sha256: hex_sha256(&bytes),
        };
        let filename = export_filename(&self.config.product_label, &content.metadata);
        sink.store(&filename, &bytes, &record).await
    }
}

impl OffprintBuilder {
    pub fn new() -> Self {
        Self {
            config: ExportConfig::default(),
            settle: SettlePolicy::default(),
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            debug_path: None,
        }
    }

    pub fn page_format(mut self, format: PageFormat) -> Self {
        self.config.page = format;
        self
    }

    pub fn margin_mm(mut self, value: f32) -> Self {
        self.config.margin = Mm::from_f32(value);
        self
    }

    pub fn safety_buffer_mm(mut self, value: f32) -> Self {
        self.config.safety_buffer = Mm::from_f32(value);
        self
    }

    pub fn surface_width_px(mut self, width: u32) -> Self {
        self.config.surface_width_px = width;
        self
    }

    pub fn supersample(mut self, factor: u32) -> Self {
        self.config.supersample = factor;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    // Leading filename segment and question-header label, e.g. "AP Chemistry FRQ".
    pub fn product_label(mut self, label: impl Into<String>) -> Self {
        self.config.product_label = label.into();
        self
    }

    pub fn settle_policy(mut self, policy: SettlePolicy) -> Self {
        self.settle = policy;
        self
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>) -> Self {
        self.font_bytes.push(data);
        self
    }

    // Enable debug logging to a JSONL file for export lifecycle inspection.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Offprint, ExportError> {
        validate_export_config(&self.config)?;
        let mut fonts = FontBook::new();
        for dir in &self.font_dirs {
            fonts.register_dir(dir);
        }
        for file in &self.font_files {
            fonts.register_file(file);
        }
        for data in self.font_bytes {
            fonts.register_bytes(data, None)?;
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        Ok(Offprint {
            config: self.config,
            settle: self.settle,
            fonts: Arc::new(fonts),
            debug,
        })
    }
}

impl Default for OffprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
