//! Turns captured section rasters into encoded, page-fitted images.

use image::codecs::jpeg::JpegEncoder;

use crate::error::ExportError;
use crate::geom::{PageGeometry, PagePlan};
use crate::surface::Raster;

/// One page's image payload and physical placement.
#[derive(Debug)]
pub(crate) struct AssembledPage {
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub plan: PagePlan,
}

/// Encodes each raster as JPEG and plans its page. One raster, one page.
pub(crate) fn assemble_pages(
    rasters: &[Raster],
    geometry: &PageGeometry,
    jpeg_quality: u8,
) -> Result<Vec<AssembledPage>, ExportError> {
    if rasters.is_empty() {
        return Err(ExportError::EmptyDocument);
    }
    let mut pages = Vec::with_capacity(rasters.len());
    for raster in rasters {
        pages.push(AssembledPage {
            jpeg: encode_jpeg(raster, jpeg_quality)?,
            width_px: raster.width_px,
            height_px: raster.height_px,
            plan: geometry.plan_page(raster.width_px, raster.height_px),
        });
    }
    Ok(pages)
}

fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>, ExportError> {
    let expected = (raster.width_px as usize) * (raster.height_px as usize) * 4;
    if raster.pixels.len() != expected {
        return Err(ExportError::Assembly(format!(
            "raster byte length {} does not match {}x{}",
            raster.pixels.len(),
            raster.width_px,
            raster.height_px
        )));
    }

    let rgb_data: Vec<u8> = raster
        .pixels
        .chunks_exact(4)
        .flat_map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect();
    let rgb = image::RgbImage::from_raw(raster.width_px, raster.height_px, rgb_data)
        .ok_or_else(|| ExportError::Assembly("rgb buffer construction failed".to_string()))?;

    let mut jpeg = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut jpeg);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| ExportError::Assembly(format!("jpeg encode failed: {err}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Mm, PageFormat};

    fn geometry() -> PageGeometry {
        PageGeometry {
            page: PageFormat::a4_portrait(),
            margin: Mm::from_f32(10.0),
            safety_buffer: Mm::from_f32(5.0),
        }
    }

    fn white_raster(width_px: u32, height_px: u32) -> Raster {
        Raster {
            width_px,
            height_px,
            pixels: vec![255; (width_px * height_px * 4) as usize],
        }
    }

    #[test]
    fn no_rasters_is_an_empty_document() {
        let err = assemble_pages(&[], &geometry(), 95).unwrap_err();
        assert!(matches!(err, ExportError::EmptyDocument));
    }

    #[test]
    fn pages_carry_jpeg_payload_and_plan() {
        let rasters = [white_raster(180, 100)];
        let pages = assemble_pages(&rasters, &geometry(), 95).unwrap();
        assert_eq!(pages.len(), 1);
        // JPEG SOI marker.
        assert_eq!(&pages[0].jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(pages[0].width_px, 180);
        // Wide raster spans the full content width.
        assert_eq!(
            pages[0].plan.image.width.to_milli_i64(),
            geometry().content_max_width().to_milli_i64()
        );
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let raster = Raster {
            width_px: 10,
            height_px: 10,
            pixels: vec![255; 12],
        };
        let err = assemble_pages(&[raster], &geometry(), 95).unwrap_err();
        assert!(matches!(err, ExportError::Assembly(_)));
    }
}
