//! Proofing pass over exported PDF bytes.
//!
//! The writer in `pdf` is trusted to be well formed, but archival and the
//! test suite both want an independent read-back: parse the output with
//! `lopdf` and confirm the page count and encryption state before the file
//! leaves the pipeline.

use lopdf::Document as LoDocument;
use lopdf::Object as LoObject;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofCode {
    ParseFailed,
    Encrypted,
    NoPages,
    PageCountMismatch,
    Io,
}

impl ProofCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofCode::ParseFailed => "PROOF_PARSE_FAILED",
            ProofCode::Encrypted => "PROOF_ENCRYPTED",
            ProofCode::NoPages => "PROOF_NO_PAGES",
            ProofCode::PageCountMismatch => "PROOF_PAGE_COUNT_MISMATCH",
            ProofCode::Io => "PROOF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofError {
    pub code: ProofCode,
    pub message: String,
}

impl std::fmt::Display for ProofError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ProofError {}

fn proof_error(code: ProofCode, message: impl Into<String>) -> ProofError {
    ProofError {
        code,
        message: message.into(),
    }
}

/// What the read-back saw. `producer` is the info dictionary's producer
/// string when one is present and decodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfProof {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub producer: Option<String>,
    pub file_size_bytes: usize,
}

pub fn proof_pdf_bytes(bytes: &[u8]) -> Result<PdfProof, ProofError> {
    let pdf = LoDocument::load_mem(bytes)
        .map_err(|err| proof_error(ProofCode::ParseFailed, err.to_string()))?;

    Ok(PdfProof {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        producer: read_producer(&pdf),
        file_size_bytes: bytes.len(),
    })
}

pub fn proof_pdf_path(path: &Path) -> Result<PdfProof, ProofError> {
    let data = std::fs::read(path).map_err(|err| proof_error(ProofCode::Io, err.to_string()))?;
    proof_pdf_bytes(&data)
}

fn read_producer(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_id).ok()?;
    match info.get(b"Producer").ok()? {
        LoObject::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Issues that make an export unfit to hand to callers or the archive.
pub fn proof_issues(proof: &PdfProof, expected_pages: usize) -> Vec<ProofCode> {
    let mut issues = Vec::new();
    if proof.encrypted {
        issues.push(ProofCode::Encrypted);
    }
    if proof.page_count == 0 {
        issues.push(ProofCode::NoPages);
    } else if proof.page_count != expected_pages {
        issues.push(ProofCode::PageCountMismatch);
    }
    issues
}

/// Rejects on the first issue, in severity order.
pub fn require_clean_proof(proof: &PdfProof, expected_pages: usize) -> Result<(), ProofError> {
    for issue in proof_issues(proof, expected_pages) {
        let message = match issue {
            ProofCode::Encrypted => "exported pdf is encrypted".to_string(),
            ProofCode::NoPages => "exported pdf has no pages".to_string(),
            ProofCode::PageCountMismatch => format!(
                "expected {} pages, found {}",
                expected_pages, proof.page_count
            ),
            ProofCode::ParseFailed | ProofCode::Io => continue,
        };
        return Err(proof_error(issue, message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble_pages;
    use crate::geom::{Mm, PageFormat, PageGeometry};
    use crate::pdf::write_pdf;
    use crate::surface::Raster;
    use std::io::Write;

    fn exported_pdf_bytes(page_count: usize) -> Vec<u8> {
        let rasters: Vec<Raster> = (0..page_count)
            .map(|_| Raster {
                width_px: 40,
                height_px: 30,
                pixels: vec![255; 40 * 30 * 4],
            })
            .collect();
        let geometry = PageGeometry {
            page: PageFormat::a4_portrait(),
            margin: Mm::from_f32(10.0),
            safety_buffer: Mm::from_f32(5.0),
        };
        let pages = assemble_pages(&rasters, &geometry, 80).unwrap();
        write_pdf(&pages, "Offprint")
    }

    fn clean_proof(page_count: usize) -> PdfProof {
        PdfProof {
            pdf_version: "1.4".to_string(),
            page_count,
            encrypted: false,
            producer: Some("Offprint".to_string()),
            file_size_bytes: 4096,
        }
    }

    #[test]
    fn proof_reads_version_pages_and_producer() {
        let bytes = exported_pdf_bytes(2);
        let proof = proof_pdf_bytes(&bytes).expect("proof");
        assert_eq!(proof.page_count, 2);
        assert!(!proof.encrypted);
        assert_eq!(proof.producer.as_deref(), Some("Offprint"));
        assert_eq!(proof.file_size_bytes, bytes.len());
        assert_eq!(proof.pdf_version, "1.4");
    }

    #[test]
    fn proof_rejects_malformed_data() {
        let err = proof_pdf_bytes(b"not a pdf").expect_err("invalid");
        assert_eq!(err.code, ProofCode::ParseFailed);
    }

    #[test]
    fn proof_path_reports_io_error_for_missing_file() {
        let missing = std::env::temp_dir().join(format!(
            "offprint_proof_missing_{}_{}.pdf",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let err = proof_pdf_path(&missing).expect_err("missing");
        assert_eq!(err.code, ProofCode::Io);
    }

    #[test]
    fn proof_path_matches_bytes_proof() {
        let bytes = exported_pdf_bytes(1);
        let temp_dir = std::env::temp_dir().join(format!(
            "offprint_proof_path_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&temp_dir).expect("mkdir");
        let path = temp_dir.join("one.pdf");
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(&bytes).expect("write");

        let from_path = proof_pdf_path(&path).expect("proof path");
        let from_bytes = proof_pdf_bytes(&bytes).expect("proof bytes");
        assert_eq!(from_path, from_bytes);
    }

    #[test]
    fn matching_export_proofs_clean() {
        let bytes = exported_pdf_bytes(3);
        let proof = proof_pdf_bytes(&bytes).expect("proof");
        assert!(proof_issues(&proof, 3).is_empty());
        require_clean_proof(&proof, 3).expect("ok");
    }

    #[test]
    fn page_count_mismatch_is_flagged() {
        let proof = clean_proof(2);
        let issues = proof_issues(&proof, 5);
        assert_eq!(issues, vec![ProofCode::PageCountMismatch]);
        let err = require_clean_proof(&proof, 5).expect_err("must fail");
        assert_eq!(err.code, ProofCode::PageCountMismatch);
        assert!(err.message.contains("expected 5"));
        assert!(err.to_string().starts_with("PROOF_PAGE_COUNT_MISMATCH"));
    }

    #[test]
    fn encrypted_output_outranks_page_issues() {
        let mut proof = clean_proof(0);
        proof.encrypted = true;
        let issues = proof_issues(&proof, 1);
        assert_eq!(issues, vec![ProofCode::Encrypted, ProofCode::NoPages]);
        // Encryption outranks the page-tree issue.
        let err = require_clean_proof(&proof, 1).expect_err("must fail");
        assert_eq!(err.code, ProofCode::Encrypted);
    }

    #[test]
    fn empty_page_tree_is_flagged() {
        let proof = clean_proof(0);
        let issues = proof_issues(&proof, 0);
        assert_eq!(issues, vec![ProofCode::NoPages]);
        let err = require_clean_proof(&proof, 0).expect_err("must fail");
        assert_eq!(err.code, ProofCode::NoPages);
    }
}
