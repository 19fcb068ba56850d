//! Paints a [`DisplayList`] into an RGBA raster.
//!
//! Text is shaped with rustybuzz against the registered face and drawn as
//! filled glyph outlines. Sections render on a white background at an integer
//! supersample factor; the assembler later decides the physical page size, so
//! everything here stays in scaled CSS pixels with a top-left origin.

use rustybuzz::{Face as HbFace, UnicodeBuffer};
use tiny_skia::{
    FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::error::ExportError;
use crate::font::FontBook;
use crate::layout::{DisplayItem, DisplayList, ImageItem, RectItem, Rgb, TextItem};
use crate::resources::ResourceStore;
use crate::surface::Raster;

/// Renders `list` at `supersample` device pixels per CSS pixel.
pub(crate) fn rasterize(
    list: &DisplayList,
    supersample: u32,
    fonts: &FontBook,
    store: &ResourceStore,
) -> Result<Raster, ExportError> {
    let scale = supersample.max(1) as f32;
    let width_px = (list.width * scale).ceil().max(1.0) as u32;
    let height_px = (list.height * scale).ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        ExportError::Capture(format!("invalid raster size {width_px}x{height_px}"))
    })?;
    pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

    let transform = Transform::from_scale(scale, scale);
    for item in &list.items {
        match item {
            DisplayItem::Rect(rect) => draw_rect(&mut pixmap, rect, transform),
            DisplayItem::Image(image) => draw_image(&mut pixmap, image, store, transform),
            DisplayItem::Text(text) => draw_text(&mut pixmap, text, fonts, transform),
        }
    }

    Ok(Raster {
        width_px,
        height_px,
        pixels: pixmap.take(),
    })
}

fn fill_paint(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::from_rgba8(color.r, color.g, color.b, 255));
    paint.anti_alias = true;
    paint
}

fn draw_rect(pixmap: &mut Pixmap, rect: &RectItem, transform: Transform) {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }
    if let Some(sk_rect) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
        let path = PathBuilder::from_rect(sk_rect);
        pixmap.fill_path(
            &path,
            &fill_paint(rect.color),
            FillRule::Winding,
            transform,
            None,
        );
    }
}

fn draw_image(pixmap: &mut Pixmap, image: &ImageItem, store: &ResourceStore, transform: Transform) {
    let Some(stored) = store.get(&image.handle) else {
        return;
    };
    let src_w = stored.pixels.width();
    let src_h = stored.pixels.height();
    if src_w == 0 || src_h == 0 || image.width <= 0.0 || image.height <= 0.0 {
        return;
    }
    let Some(source) = rgba_to_pixmap(&stored.pixels) else {
        return;
    };
    let sx = image.width / src_w as f32;
    let sy = image.height / src_h as f32;
    let placement = Transform::from_row(sx, 0.0, 0.0, sy, image.x, image.y);
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    pixmap.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &paint,
        transform.pre_concat(placement),
        None,
    );
}

fn rgba_to_pixmap(image: &image::RgbaImage) -> Option<Pixmap> {
    let width = image.width();
    let height = image.height();
    let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        // tiny-skia expects premultiplied alpha.
        let premultiply = |channel: u8| ((channel as u16 * a as u16 + 127) / 255) as u8;
        data.push(premultiply(r));
        data.push(premultiply(g));
        data.push(premultiply(b));
        data.push(a);
    }
    let size = IntSize::from_wh(width, height)?;
    Pixmap::from_vec(data, size)
}

fn draw_text(pixmap: &mut Pixmap, text: &TextItem, fonts: &FontBook, transform: Transform) {
    if text.size <= 0.0 || text.text.is_empty() {
        return;
    }
    let face = if text.bold {
        fonts
            .resolve(&format!("{} Bold", text.family))
            .or_else(|| fonts.resolve(&text.family))
            .or_else(|| fonts.default_face())
    } else {
        fonts
            .resolve(&text.family)
            .or_else(|| fonts.default_face())
    };
    // Without any registered face the text cell stays blank; layout geometry
    // already accounted for it via the width heuristic.
    let Some(face) = face else {
        return;
    };
    let synthetic_bold = text.bold && !face.name.to_ascii_lowercase().contains("bold");

    let run = shape_glyph_run(&face.data, &text.text, text.size, (text.x, text.baseline_y));
    if run.glyphs.is_empty() {
        return;
    }
    let Ok(parsed) = ttf_parser::Face::parse(&face.data, 0) else {
        return;
    };

    let paint = fill_paint(text.color);
    let mut stroke = Stroke::default();
    stroke.width = (text.size * 0.04).max(0.2);
    let px_per_unit = run.px_per_unit;
    for glyph in run.glyphs {
        let mut sink = OutlineSink::new((glyph.x, glyph.y), px_per_unit);
        if parsed.outline_glyph(GlyphId(glyph.id), &mut sink).is_none() {
            continue;
        }
        let Some(path) = sink.into_path() else {
            continue;
        };
        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        if synthetic_bold {
            pixmap.stroke_path(&path, &paint, &stroke, transform, None);
        }
    }
}

#[derive(Clone, Copy)]
struct PlacedGlyph {
    id: u16,
    x: f32,
    y: f32,
}

/// One shaped line of text: glyph origins in raster pixels plus the single
/// pixels-per-font-unit factor the whole run shares.
struct GlyphRun {
    glyphs: Vec<PlacedGlyph>,
    px_per_unit: f32,
}

impl GlyphRun {
    fn empty() -> Self {
        GlyphRun {
            glyphs: Vec::new(),
            px_per_unit: 1.0,
        }
    }
}

/// Shapes `text` with rustybuzz so kerning and ligatures match what the
/// measurement pass saw, then walks the pen from `pen` accumulating advances.
/// Falls back to a plain cmap walk when the face refuses to shape.
fn shape_glyph_run(data: &[u8], text: &str, size: f32, pen: (f32, f32)) -> GlyphRun {
    let Some(face) = HbFace::from_slice(data, 0) else {
        return char_map_run(data, text, size, pen);
    };
    let px_per_unit = size / (face.units_per_em().max(1) as f32);

    let mut unshaped = UnicodeBuffer::new();
    unshaped.push_str(text);
    let shaped = rustybuzz::shape(&face, &[], unshaped);
    let infos = shaped.glyph_infos();
    if infos.is_empty() {
        return char_map_run(data, text, size, pen);
    }

    let mut glyphs = Vec::with_capacity(infos.len());
    let (mut cursor_x, mut cursor_y) = pen;
    for (info, pos) in infos.iter().zip(shaped.glyph_positions()) {
        let id = info.glyph_id as u16;
        // Glyph 0 is .notdef; advance past it without drawing a tofu box.
        if id != 0 {
            glyphs.push(PlacedGlyph {
                id,
                x: cursor_x + pos.x_offset as f32 * px_per_unit,
                y: cursor_y - pos.y_offset as f32 * px_per_unit,
            });
        }
        cursor_x += pos.x_advance as f32 * px_per_unit;
        cursor_y -= pos.y_advance as f32 * px_per_unit;
    }
    GlyphRun {
        glyphs,
        px_per_unit,
    }
}

/// Shaping fallback: map chars through cmap one at a time and use the bare
/// horizontal advances. Characters the face does not cover get half an em of
/// cursor travel so the rest of the line stays roughly in place.
fn char_map_run(data: &[u8], text: &str, size: f32, pen: (f32, f32)) -> GlyphRun {
    let Ok(face) = ttf_parser::Face::parse(data, 0) else {
        return GlyphRun::empty();
    };
    let px_per_unit = size / (face.units_per_em().max(1) as f32);

    let mut glyphs = Vec::new();
    let mut cursor_x = pen.0;
    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch).filter(|gid| gid.0 != 0) else {
            cursor_x += size * 0.5;
            continue;
        };
        glyphs.push(PlacedGlyph {
            id: gid.0,
            x: cursor_x,
            y: pen.1,
        });
        cursor_x += match face.glyph_hor_advance(gid) {
            Some(units) if units > 0 => units as f32 * px_per_unit,
            _ => size * 0.5,
        };
    }
    GlyphRun {
        glyphs,
        px_per_unit,
    }
}

/// Collects one glyph outline into a [`Path`], projecting font units (y up)
/// into raster pixels (y down) around the glyph origin.
struct OutlineSink {
    path: PathBuilder,
    origin: (f32, f32),
    px_per_unit: f32,
}

impl OutlineSink {
    fn new(origin: (f32, f32), px_per_unit: f32) -> Self {
        Self {
            path: PathBuilder::new(),
            origin,
            px_per_unit,
        }
    }

    fn project(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin.0 + x * self.px_per_unit,
            self.origin.1 - y * self.px_per_unit,
        )
    }

    fn into_path(self) -> Option<Path> {
        self.path.finish()
    }
}

impl OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.project(x, y);
        self.path.move_to(px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.project(x, y);
        self.path.line_to(px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (cx, cy) = self.project(x1, y1);
        let (px, py) = self.project(x, y);
        self.path.quad_to(cx, cy, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (ax, ay) = self.project(x1, y1);
        let (bx, by) = self.project(x2, y2);
        let (px, py) = self.project(x, y);
        self.path.cubic_to(ax, ay, bx, by, px, py);
    }

    fn close(&mut self) {
        self.path.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DisplayList;

    fn pixel(raster: &Raster, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * raster.width_px + x) * 4) as usize;
        (
            raster.pixels[idx],
            raster.pixels[idx + 1],
            raster.pixels[idx + 2],
        )
    }

    fn list_of(width: f32, height: f32, items: Vec<DisplayItem>) -> DisplayList {
        DisplayList {
            items,
            width,
            height,
        }
    }

    #[test]
    fn supersample_scales_raster_dimensions() {
        let fonts = FontBook::new();
        let store = ResourceStore::new();
        let list = list_of(10.0, 20.0, Vec::new());
        let raster = rasterize(&list, 2, &fonts, &store).unwrap();
        assert_eq!(raster.width_px, 20);
        assert_eq!(raster.height_px, 40);
        assert_eq!(raster.pixels.len(), 20 * 40 * 4);
        assert_eq!(pixel(&raster, 0, 0), (255, 255, 255));
    }

    #[test]
    fn rect_items_paint_solid_pixels() {
        let fonts = FontBook::new();
        let store = ResourceStore::new();
        let list = list_of(
            8.0,
            8.0,
            vec![DisplayItem::Rect(RectItem {
                x: 1.0,
                y: 1.0,
                width: 4.0,
                height: 4.0,
                color: Rgb { r: 10, g: 20, b: 30 },
            })],
        );
        let raster = rasterize(&list, 1, &fonts, &store).unwrap();
        assert_eq!(pixel(&raster, 3, 3), (10, 20, 30));
        assert_eq!(pixel(&raster, 7, 7), (255, 255, 255));
    }

    #[test]
    fn image_items_blit_stored_pixels() {
        let fonts = FontBook::new();
        let mut store = ResourceStore::new();
        let uri = crate::resources::tests::png_data_uri(4, 4);
        let handle = store.publish("question", &uri).unwrap();
        let list = list_of(
            4.0,
            4.0,
            vec![DisplayItem::Image(ImageItem {
                handle: handle.clone(),
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
            })],
        );
        let raster = rasterize(&list, 1, &fonts, &store).unwrap();
        let (r, g, b) = pixel(&raster, 2, 2);
        // Fixture pixels are (200, 30, 30).
        assert!(r > 150, "red channel too low: {r}");
        assert!(g < 90 && b < 90);
    }

    #[test]
    fn text_without_registered_faces_leaves_raster_blank() {
        let fonts = FontBook::new();
        let store = ResourceStore::new();
        let list = list_of(
            40.0,
            20.0,
            vec![DisplayItem::Text(TextItem {
                text: "hello".to_string(),
                x: 2.0,
                baseline_y: 12.0,
                size: 10.0,
                bold: false,
                color: Rgb::BLACK,
                family: "Inter".to_string(),
            })],
        );
        let raster = rasterize(&list, 1, &fonts, &store).unwrap();
        assert!(raster.pixels.chunks_exact(4).all(|px| px[0] == 255));
    }

    #[test]
    fn zero_sized_list_still_produces_a_pixel() {
        let fonts = FontBook::new();
        let store = ResourceStore::new();
        let list = list_of(0.0, 0.0, Vec::new());
        let raster = rasterize(&list, 1, &fonts, &store).unwrap();
        assert_eq!(raster.width_px, 1);
        assert_eq!(raster.height_px, 1);
    }
}
