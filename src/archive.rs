//! Persistence sinks for archival exports.
//!
//! The pipeline hands a finished PDF plus its [`ArchiveRecord`] to a sink and
//! gets back a sink-specific locator. Sinks are constructed explicitly and
//! injected; nothing here holds global state.

use std::path::PathBuf;

use offprint_archive_contract::ArchiveRecord;
use tokio::fs;

use crate::error::ExportError;

/// Path segment every archived export lands under.
pub const ARCHIVE_PREFIX: &str = "frq-archive";

/// Futures here are driven on a current-thread runtime; no Send bound is
/// wanted.
#[allow(async_fn_in_trait)]
pub trait ArchiveSink {
    /// Stores one export and its record. Returns a locator for the stored
    /// PDF, in whatever form the sink addresses its contents.
    async fn store(
        &mut self,
        filename: &str,
        pdf: &[u8],
        record: &ArchiveRecord,
    ) -> Result<String, ExportError>;
}

/// Filesystem sink: `<root>/frq-archive/<filename>` plus a `.json` sidecar
/// holding the record's canonical encoding.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArchiveSink for FsArchive {
    async fn store(
        &mut self,
        filename: &str,
        pdf: &[u8],
        record: &ArchiveRecord,
    ) -> Result<String, ExportError> {
        let dir = self.root.join(ARCHIVE_PREFIX);
        fs::create_dir_all(&dir).await?;

        let pdf_path = dir.join(filename);
        fs::write(&pdf_path, pdf).await?;
        fs::write(
            dir.join(format!("{filename}.json")),
            record.canonical_json(),
        )
        .await?;

        Ok(pdf_path.to_string_lossy().into_owned())
    }
}

/// One stored export, as kept by [`MemoryArchive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedExport {
    pub filename: String,
    pub pdf: Vec<u8>,
    pub record: ArchiveRecord,
}

/// In-memory sink for tests and for callers that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    pub entries: Vec<ArchivedExport>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveSink for MemoryArchive {
    async fn store(
        &mut self,
        filename: &str,
        pdf: &[u8],
        record: &ArchiveRecord,
    ) -> Result<String, ExportError> {
        self.entries.push(ArchivedExport {
            filename: filename.to_string(),
            pdf: pdf.to_vec(),
            record: record.clone(),
        });
        Ok(format!("{ARCHIVE_PREFIX}/{filename}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ArchiveRecord {
        ArchiveRecord {
            kind_code: "MR".to_string(),
            unit: "Unit 2".to_string(),
            topics: vec!["2.1".to_string(), "2.3".to_string()],
            max_points: 10,
            generated_at_ms: 1_735_689_600_000,
            page_count: 2,
            pdf_sha256: offprint_archive_contract::hex_sha256(b"%PDF-1.4 sample"),
        }
    }

    #[tokio::test]
    async fn fs_archive_writes_pdf_and_sidecar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = FsArchive::new(dir.path());
        let record = sample_record();

        let locator = sink
            .store("AP Physics FRQ - MR - unit 2.1.pdf", b"%PDF-1.4 sample", &record)
            .await
            .expect("store");
        assert!(locator.contains(ARCHIVE_PREFIX));

        let pdf_path = dir
            .path()
            .join(ARCHIVE_PREFIX)
            .join("AP Physics FRQ - MR - unit 2.1.pdf");
        let stored = std::fs::read(&pdf_path).expect("stored pdf");
        assert_eq!(stored, b"%PDF-1.4 sample");

        let sidecar =
            std::fs::read_to_string(pdf_path.with_file_name("AP Physics FRQ - MR - unit 2.1.pdf.json"))
                .expect("sidecar");
        assert_eq!(sidecar, record.canonical_json());
    }

    #[tokio::test]
    async fn fs_archive_accepts_repeated_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = FsArchive::new(dir.path());
        let record = sample_record();

        sink.store("first.pdf", b"a", &record).await.expect("first");
        sink.store("second.pdf", b"b", &record).await.expect("second");

        let base = dir.path().join(ARCHIVE_PREFIX);
        assert!(base.join("first.pdf").exists());
        assert!(base.join("second.pdf").exists());
    }

    #[tokio::test]
    async fn memory_archive_accumulates_entries() {
        let mut sink = MemoryArchive::new();
        let record = sample_record();

        let locator = sink.store("one.pdf", b"x", &record).await.expect("store");
        assert_eq!(locator, "frq-archive/one.pdf");
        assert_eq!(sink.entries.len(), 1);
        assert_eq!(sink.entries[0].filename, "one.pdf");
        assert_eq!(sink.entries[0].pdf, b"x");
        assert_eq!(sink.entries[0].record, record);
    }
}
