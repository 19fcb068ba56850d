use crate::error::ExportError;
use crate::geom::{Mm, PageFormat, PageGeometry};

/// Per-export inclusion switches. Downloads ship everything; archival
/// snapshots ship only the question and scoring material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_feedback: bool,
    pub include_chat_history: bool,
}

impl ExportOptions {
    pub fn download() -> Self {
        Self {
            include_feedback: true,
            include_chat_history: true,
        }
    }

    pub fn archival() -> Self {
        Self {
            include_feedback: false,
            include_chat_history: false,
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::download()
    }
}

/// Engine configuration, fully enumerated. Every knob has an explicit
/// default; `validate_export_config` runs at the export boundary.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub page: PageFormat,
    pub margin: Mm,
    pub safety_buffer: Mm,
    /// Logical width of the mounted surface in CSS pixels.
    pub surface_width_px: u32,
    /// Raster supersampling factor applied at capture time.
    pub supersample: u32,
    pub jpeg_quality: u8,
    /// Leading filename segment, e.g. a product or course label.
    pub product_label: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page: PageFormat::a4_portrait(),
            margin: Mm::from_f32(10.0),
            safety_buffer: Mm::from_f32(5.0),
            // 8.5in at 96 px/in, the width the section markup is tuned for.
            surface_width_px: 816,
            supersample: 2,
            jpeg_quality: 95,
            product_label: "FRQ".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            page: self.page,
            margin: self.margin,
            safety_buffer: self.safety_buffer,
        }
    }
}

pub(crate) fn validate_export_config(config: &ExportConfig) -> Result<(), ExportError> {
    if config.surface_width_px == 0 {
        return Err(ExportError::InvalidConfiguration(
            "surface width must be at least one logical pixel".to_string(),
        ));
    }
    if config.supersample == 0 {
        return Err(ExportError::InvalidConfiguration(
            "supersample factor must be at least 1".to_string(),
        ));
    }
    if config.jpeg_quality == 0 || config.jpeg_quality > 100 {
        return Err(ExportError::InvalidConfiguration(format!(
            "jpeg quality must be within 1..=100 (got {})",
            config.jpeg_quality
        )));
    }
    if config.geometry().content_max_width() <= Mm::ZERO {
        return Err(ExportError::InvalidConfiguration(
            "margins leave no horizontal content area".to_string(),
        ));
    }
    if config.geometry().effective_max_height() <= Mm::ZERO {
        return Err(ExportError::InvalidConfiguration(
            "margins and safety buffer leave no vertical content area".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a4_download_profile() {
        let config = ExportConfig::default();
        assert_eq!(config.page, PageFormat::a4_portrait());
        assert_eq!(config.margin.to_milli_i64(), 10_000);
        assert_eq!(config.safety_buffer.to_milli_i64(), 5_000);
        assert_eq!(config.surface_width_px, 816);
        assert_eq!(config.supersample, 2);
        assert_eq!(config.jpeg_quality, 95);
        assert!(validate_export_config(&config).is_ok());

        let options = ExportOptions::default();
        assert!(options.include_feedback);
        assert!(options.include_chat_history);
        let archival = ExportOptions::archival();
        assert!(!archival.include_feedback);
        assert!(!archival.include_chat_history);
    }

    #[test]
    fn validation_rejects_degenerate_configs() {
        let mut config = ExportConfig::default();
        config.supersample = 0;
        assert!(validate_export_config(&config).is_err());

        let mut config = ExportConfig::default();
        config.jpeg_quality = 0;
        assert!(validate_export_config(&config).is_err());

        let mut config = ExportConfig::default();
        config.jpeg_quality = 101;
        assert!(validate_export_config(&config).is_err());

        let mut config = ExportConfig::default();
        config.margin = Mm::from_f32(120.0);
        assert!(validate_export_config(&config).is_err());

        let mut config = ExportConfig::default();
        config.surface_width_px = 0;
        assert!(validate_export_config(&config).is_err());
    }
}
