use crate::error::ExportError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use ttf_parser::GlyphId;
use ttf_parser::name::name_id;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct MeasureKey {
    face_index: usize,
    size_milli: i64,
    text: String,
}

const MEASURE_CACHE_CAP: usize = 20_000;

#[derive(Debug)]
pub(crate) struct RegisteredFace {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) units_per_em: u16,
    pub(crate) ascent: i16,
}

/// Registered typefaces for layout measurement and glyph rasterization.
/// Works without any registered face: widths then fall back to a 0.6 em
/// per-character heuristic so section heights stay stable.
#[derive(Debug)]
pub(crate) struct FontBook {
    faces: Vec<RegisteredFace>,
    lookup: HashMap<String, usize>,
    measure_cache: Mutex<HashMap<MeasureKey, f32>>,
}

impl FontBook {
    pub(crate) fn new() -> Self {
        Self {
            faces: Vec::new(),
            lookup: HashMap::new(),
            measure_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registers every font file in `path`, in sorted filename order so the
    /// default face does not depend on directory iteration order.
    pub(crate) fn register_dir(&mut self, path: impl AsRef<Path>) {
        let Ok(entries) = fs::read_dir(path.as_ref()) else {
            return;
        };
        let mut files: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        for file in files {
            self.register_file(file);
        }
    }

    pub(crate) fn register_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|v| v.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("ttf") | Some("otf") => {}
            _ => return,
        }
        let Ok(data) = fs::read(path) else {
            return;
        };
        let stem = path.file_stem().and_then(|v| v.to_str()).map(str::to_string);
        let _ = self.register_bytes(data, stem.as_deref());
    }

    pub(crate) fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, ExportError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(ExportError::Asset(format!(
                "invalid font data for {source}"
            )));
        };

        let postscript = name_entry(&face, name_id::POST_SCRIPT_NAME);
        let full = name_entry(&face, name_id::FULL_NAME);
        let family = name_entry(&face, name_id::TYPOGRAPHIC_FAMILY)
            .or_else(|| name_entry(&face, name_id::FAMILY));
        let stem = source_name.map(str::to_string);

        let units_per_em = face.units_per_em();
        let ascent = face.ascender();

        let primary = postscript
            .clone()
            .or_else(|| full.clone())
            .or_else(|| family.clone())
            .or_else(|| stem.clone())
            .unwrap_or_else(|| source.to_string());

        let index = self.faces.len();
        self.faces.push(RegisteredFace {
            name: primary.clone(),
            data,
            units_per_em,
            ascent,
        });
        for alias in [Some(primary.clone()), family, full, postscript, stem]
            .into_iter()
            .flatten()
        {
            let key = normalize_name(&alias);
            if !key.is_empty() {
                self.lookup.entry(key).or_insert(index);
            }
        }

        Ok(primary)
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFace> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.faces.get(*index))
    }

    /// First face registered, used when the markup asks for a family
    /// nothing was registered under.
    pub(crate) fn default_face(&self) -> Option<&RegisteredFace> {
        self.faces.first()
    }

    #[allow(dead_code)]
    pub(crate) fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Re-parses every registered face and returns the names that fail.
    /// Run before capture so a face that went bad surfaces in the log
    /// instead of as a silently blank glyph run.
    pub(crate) fn verify_faces(&self) -> Vec<String> {
        self.faces
            .iter()
            .filter(|face| ttf_parser::Face::parse(&face.data, 0).is_err())
            .map(|face| face.name.clone())
            .collect()
    }

    /// Width of `text` at `size` px. Unregistered families measure with the
    /// heuristic so layout stays deterministic with no fonts at all.
    pub(crate) fn measure_text_width(&self, name: &str, size: f32, text: &str) -> f32 {
        let key = normalize_name(name);
        let index = match self.lookup.get(&key).copied() {
            Some(index) => index,
            None => {
                if self.faces.is_empty() {
                    return heuristic_width(size, text);
                }
                0
            }
        };
        let cache_key = MeasureKey {
            face_index: index,
            size_milli: (size as f64 * 1000.0).round() as i64,
            text: text.to_string(),
        };
        if let Ok(cache) = self.measure_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return *value;
            }
        }
        let Some(registered) = self.faces.get(index) else {
            return heuristic_width(size, text);
        };
        let value = measure_with_face(registered, size, text)
            .unwrap_or_else(|| heuristic_width(size, text));
        if let Ok(mut cache) = self.measure_cache.lock() {
            if cache.len() >= MEASURE_CACHE_CAP {
                cache.clear();
            }
            cache.insert(cache_key, value);
        }
        value
    }

    /// Baseline offset from the top of a line box at `size` px.
    pub(crate) fn ascent(&self, name: &str, size: f32) -> f32 {
        let face = self.resolve(name).or_else(|| self.default_face());
        match face {
            Some(face) if face.units_per_em > 0 => {
                size * face.ascent as f32 / face.units_per_em as f32
            }
            _ => size * 0.8,
        }
    }
}

fn name_entry(face: &ttf_parser::Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|entry| entry.name_id == id)
        .find_map(|entry| entry.to_string())
}

fn heuristic_width(size: f32, text: &str) -> f32 {
    let char_width = (size * 0.6).max(1.0);
    char_width * text.chars().count() as f32
}

fn measure_with_face(registered: &RegisteredFace, size: f32, text: &str) -> Option<f32> {
    let face = ttf_parser::Face::parse(&registered.data, 0).ok()?;
    let upem = face.units_per_em();
    if upem == 0 {
        return None;
    }
    let scale = size / upem as f32;
    let mut width = 0.0f32;
    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(gid) => {
                let advance = face.glyph_hor_advance(GlyphId(gid.0)).unwrap_or(upem / 2) as f32;
                width += advance * scale;
            }
            None => {
                width += size * 0.5;
            }
        }
    }
    Some(width)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_measures_with_the_heuristic() {
        let book = FontBook::new();
        let width = book.measure_text_width("Inter", 10.0, "abcd");
        assert!((width - 24.0).abs() < 1e-4);
        assert_eq!(book.face_count(), 0);
        assert!(book.resolve("Inter").is_none());
    }

    #[test]
    fn heuristic_floors_tiny_sizes_at_one_pixel_per_char() {
        let book = FontBook::new();
        let width = book.measure_text_width("Inter", 0.5, "xy");
        assert!((width - 2.0).abs() < 1e-4);
    }

    #[test]
    fn invalid_font_bytes_are_an_asset_error() {
        let mut book = FontBook::new();
        let err = book
            .register_bytes(vec![0, 1, 2, 3], Some("bogus"))
            .unwrap_err();
        match err {
            ExportError::Asset(message) => assert!(message.contains("bogus")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ascent_falls_back_without_faces() {
        let book = FontBook::new();
        assert!((book.ascent("Inter", 10.0) - 8.0).abs() < 1e-4);
    }

    #[test]
    fn name_normalization_strips_quotes_and_case() {
        assert_eq!(normalize_name("  \"Inter\"  "), "inter");
        assert_eq!(normalize_name("'STIX Two Math'"), "stix two math");
    }
}
