use std::collections::HashMap;
use std::fs;

use base64::Engine;
use offprint_archive_contract::hex_sha256;

use crate::error::ExportError;

/// Scheme prefix for store-backed image handles swapped into the DOM in
/// place of inline payloads.
pub(crate) const RESOURCE_SCHEME: &str = "resource:";

pub(crate) struct StoredImage {
    pub bytes: Vec<u8>,
    pub pixels: image::RgbaImage,
}

/// Decoded-image store for one export. Inline payloads are published here
/// and referenced by handle, since multi-megabyte inline URIs render
/// unreliably through the capture path. Handles are revoked per section
/// once the owning section has been captured.
#[derive(Default)]
pub(crate) struct ResourceStore {
    entries: HashMap<String, StoredImage>,
    owners: HashMap<String, Vec<String>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn publish(&mut self, section_key: &str, src: &str) -> Result<String, ExportError> {
        let stored = decode_source(src)?;
        Ok(self.insert(section_key, stored))
    }

    /// Stores an already-decoded image under its content hash, records
    /// `section_key` as an owner, and returns the handle.
    pub fn insert(&mut self, section_key: &str, stored: StoredImage) -> String {
        let handle = format!("{}{}", RESOURCE_SCHEME, &hex_sha256(&stored.bytes)[..16]);
        self.entries.entry(handle.clone()).or_insert(stored);
        let owners = self.owners.entry(handle.clone()).or_default();
        if !owners.iter().any(|owner| owner == section_key) {
            owners.push(section_key.to_string());
        }
        handle
    }

    pub fn get(&self, handle: &str) -> Option<&StoredImage> {
        self.entries.get(handle)
    }

    #[allow(dead_code)]
    pub fn handle_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every handle whose only remaining owner is `section_key`.
    pub fn revoke_section(&mut self, section_key: &str) {
        let mut dead: Vec<String> = Vec::new();
        for (handle, owners) in self.owners.iter_mut() {
            owners.retain(|owner| owner != section_key);
            if owners.is_empty() {
                dead.push(handle.clone());
            }
        }
        for handle in dead {
            self.owners.remove(&handle);
            self.entries.remove(&handle);
        }
    }

    pub fn revoke_all(&mut self) {
        self.owners.clear();
        self.entries.clear();
    }
}

/// Fetches and decodes one image source with no store mutation, so sources
/// can be resolved concurrently and inserted afterwards.
pub(crate) fn decode_source(src: &str) -> Result<StoredImage, ExportError> {
    let (mime, bytes) = load_image_source(src)?;
    let format = if mime.contains("png") {
        Some(image::ImageFormat::Png)
    } else if mime.contains("jpeg") || mime.contains("jpg") {
        Some(image::ImageFormat::Jpeg)
    } else {
        image::guess_format(&bytes).ok()
    };
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(&bytes, format),
        None => image::load_from_memory(&bytes),
    }
    .map_err(|err| ExportError::Asset(format!("image decode failed: {err}")))?;
    let pixels = decoded.to_rgba8();
    Ok(StoredImage { bytes, pixels })
}

fn load_image_source(src: &str) -> Result<(String, Vec<u8>), ExportError> {
    if let Some((mime, bytes)) = parse_data_uri(src) {
        return Ok((mime, bytes));
    }
    if src.starts_with("data:") {
        return Err(ExportError::Asset("malformed data URI".to_string()));
    }
    if src.contains("://") {
        return Err(ExportError::Asset(format!(
            "external image source is not fetched: {}",
            truncate_src(src)
        )));
    }
    let bytes = fs::read(src)
        .map_err(|err| ExportError::Asset(format!("image file read failed: {err}")))?;
    Ok((mime_from_extension(src), bytes))
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let parts: Vec<&str> = uri.splitn(2, ',').collect();
    if parts.len() != 2 {
        return None;
    }
    let header = parts[0];
    let data_part = parts[1];
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn mime_from_extension(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png".to_string()
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

pub(crate) fn truncate_src(src: &str) -> String {
    const LIMIT: usize = 48;
    if src.chars().count() <= LIMIT {
        src.to_string()
    } else {
        let head: String = src.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}
