//! Block layout for section DOM trees.
//!
//! Walks a section element and produces a flat [`DisplayList`] of text runs,
//! image placements, and border rects in CSS pixel coordinates. The flow model
//! is deliberately small: block boxes stack vertically, inline content wraps
//! greedily inside its block, and images are sized by their intrinsic
//! dimensions clamped to the content width and any `max-height`.

use kuchiki::NodeRef;
use lightningcss::properties::Property;
use lightningcss::properties::border::BorderSideWidth;
use lightningcss::properties::font::{FontFamily, FontSize, LineHeight};
use lightningcss::properties::size::MaxSize;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleAttribute};
use lightningcss::traits::ToCss;
use lightningcss::values::color::CssColor;
use lightningcss::values::length::{LengthPercentage, LengthPercentageOrAuto, LengthValue};

use crate::font::FontBook;
use crate::resources::ResourceStore;

/// 8-bit sRGB color. Alpha is blended over white at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
}

#[derive(Debug, Clone)]
pub(crate) enum DisplayItem {
    Text(TextItem),
    Image(ImageItem),
    Rect(RectItem),
}

#[derive(Debug, Clone)]
pub(crate) struct TextItem {
    pub(crate) text: String,
    pub(crate) x: f32,
    pub(crate) baseline_y: f32,
    pub(crate) size: f32,
    pub(crate) bold: bool,
    pub(crate) color: Rgb,
    pub(crate) family: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ImageItem {
    pub(crate) handle: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct RectItem {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) color: Rgb,
}

/// Laid-out section content in CSS pixels, origin at the section border box.
#[derive(Debug, Clone)]
pub(crate) struct DisplayList {
    pub(crate) items: Vec<DisplayItem>,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

/// Inherited text properties, seeded from the UA-ish defaults the section
/// markup assumes.
#[derive(Debug, Clone)]
struct TextStyle {
    size: f32,
    line_height: f32,
    bold: bool,
    color: Rgb,
    family: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle {
            size: 16.0,
            line_height: 1.2,
            bold: false,
            color: Rgb::BLACK,
            family: "Inter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    top: Option<f32>,
    right: Option<f32>,
    bottom: Option<f32>,
    left: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
enum FontSizeSpec {
    Px(f32),
    Scale(f32),
}

/// Everything a style attribute can contribute to layout.
#[derive(Debug, Clone, Default)]
struct StyleDelta {
    font_size: Option<FontSizeSpec>,
    line_height: Option<f32>,
    bold: Option<bool>,
    color: Option<Rgb>,
    family: Option<String>,
    margin: Edges,
    padding: Edges,
    border_left: Option<(f32, Rgb)>,
    border_bottom: Option<(f32, Rgb)>,
    border_all: Option<(f32, Rgb)>,
    max_height: Option<f32>,
}

fn parse_style_attr(style: &str) -> StyleDelta {
    let mut delta = StyleDelta::default();
    if let Ok(parsed) = StyleAttribute::parse(style, ParserOptions::default()) {
        apply_properties(&parsed.declarations.declarations, &mut delta);
        apply_properties(&parsed.declarations.important_declarations, &mut delta);
    }
    delta
}

fn apply_properties(props: &[Property], delta: &mut StyleDelta) {
    for prop in props {
        match prop {
            Property::FontSize(size) => {
                delta.font_size = font_size_spec(size);
            }
            Property::FontWeight(weight) => {
                if let Ok(raw) = weight.to_css_string(PrinterOptions::default()) {
                    delta.bold = Some(weight_is_bold(&raw));
                }
            }
            Property::LineHeight(height) => {
                delta.line_height = line_height_multiplier(height);
            }
            Property::Color(color) => {
                delta.color = rgb_from_css(color);
            }
            Property::FontFamily(families) => {
                delta.family = first_family_name(families);
            }
            Property::Margin(value) => {
                apply_edge(&mut delta.margin.top, &value.top);
                apply_edge(&mut delta.margin.right, &value.right);
                apply_edge(&mut delta.margin.bottom, &value.bottom);
                apply_edge(&mut delta.margin.left, &value.left);
            }
            Property::MarginTop(value) => apply_edge(&mut delta.margin.top, value),
            Property::MarginRight(value) => apply_edge(&mut delta.margin.right, value),
            Property::MarginBottom(value) => apply_edge(&mut delta.margin.bottom, value),
            Property::MarginLeft(value) => apply_edge(&mut delta.margin.left, value),
            Property::Padding(value) => {
                apply_edge(&mut delta.padding.top, &value.top);
                apply_edge(&mut delta.padding.right, &value.right);
                apply_edge(&mut delta.padding.bottom, &value.bottom);
                apply_edge(&mut delta.padding.left, &value.left);
            }
            Property::PaddingTop(value) => apply_edge(&mut delta.padding.top, value),
            Property::PaddingRight(value) => apply_edge(&mut delta.padding.right, value),
            Property::PaddingBottom(value) => apply_edge(&mut delta.padding.bottom, value),
            Property::PaddingLeft(value) => apply_edge(&mut delta.padding.left, value),
            Property::Border(value) => {
                delta.border_all = border_spec(&value.width, &value.color);
            }
            Property::BorderLeft(value) => {
                delta.border_left = border_spec(&value.width, &value.color);
            }
            Property::BorderBottom(value) => {
                delta.border_bottom = border_spec(&value.width, &value.color);
            }
            Property::MaxHeight(value) => {
                delta.max_height = match value {
                    MaxSize::LengthPercentage(lp) => px_from_lp(lp),
                    _ => None,
                };
            }
            _ => {}
        }
    }
}

fn font_size_spec(size: &FontSize) -> Option<FontSizeSpec> {
    match size {
        FontSize::Length(lp) => match lp {
            LengthPercentage::Dimension(value) => match value {
                LengthValue::Em(scale) => Some(FontSizeSpec::Scale(*scale)),
                LengthValue::Rem(scale) => Some(FontSizeSpec::Px(16.0 * scale)),
                other => other.to_px().map(FontSizeSpec::Px),
            },
            LengthPercentage::Percentage(pct) => Some(FontSizeSpec::Scale(pct.0)),
            LengthPercentage::Calc(_) => None,
        },
        FontSize::Absolute(_) | FontSize::Relative(_) => None,
    }
}

fn weight_is_bold(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("bold") || trimmed.eq_ignore_ascii_case("bolder") {
        return true;
    }
    trimmed
        .parse::<f32>()
        .map(|weight| weight >= 600.0)
        .unwrap_or(false)
}

fn line_height_multiplier(height: &LineHeight) -> Option<f32> {
    match height {
        LineHeight::Normal => Some(1.2),
        LineHeight::Number(value) => Some(*value),
        LineHeight::Length(lp) => match lp {
            LengthPercentage::Percentage(pct) => Some(pct.0),
            _ => None,
        },
    }
}

fn rgb_from_css(color: &CssColor) -> Option<Rgb> {
    match color {
        CssColor::RGBA(rgba) => {
            let alpha = rgba.alpha as f32 / 255.0;
            let blend = |channel: u8| -> u8 {
                let value = channel as f32 * alpha + 255.0 * (1.0 - alpha);
                value.round().clamp(0.0, 255.0) as u8
            };
            Some(Rgb {
                r: blend(rgba.red),
                g: blend(rgba.green),
                b: blend(rgba.blue),
            })
        }
        _ => None,
    }
}

fn first_family_name(families: &[FontFamily]) -> Option<String> {
    for family in families {
        if let FontFamily::FamilyName(name) = family {
            if let Ok(css) = name.to_css_string(PrinterOptions::default()) {
                let trimmed = css.trim_matches(|c| c == '"' || c == '\'').trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
        }
    }
    None
}

fn apply_edge(slot: &mut Option<f32>, value: &LengthPercentageOrAuto) {
    if let Some(px) = px_from_lpa(value) {
        *slot = Some(px);
    }
}

fn px_from_lpa(value: &LengthPercentageOrAuto) -> Option<f32> {
    match value {
        LengthPercentageOrAuto::Auto => Some(0.0),
        LengthPercentageOrAuto::LengthPercentage(lp) => px_from_lp(lp),
    }
}

fn px_from_lp(value: &LengthPercentage) -> Option<f32> {
    match value {
        LengthPercentage::Dimension(length) => length.to_px(),
        _ => None,
    }
}

fn border_width_px(width: &BorderSideWidth) -> Option<f32> {
    match width {
        BorderSideWidth::Thin => Some(1.0),
        BorderSideWidth::Medium => Some(2.0),
        BorderSideWidth::Thick => Some(4.0),
        BorderSideWidth::Length(length) => length.to_px(),
    }
}

fn border_spec(width: &BorderSideWidth, color: &CssColor) -> Option<(f32, Rgb)> {
    let px = border_width_px(width)?;
    if px <= 0.0 {
        return None;
    }
    Some((px, rgb_from_css(color).unwrap_or(Rgb::BLACK)))
}

fn element_delta(node: &NodeRef) -> StyleDelta {
    match node.as_element() {
        Some(el) => el
            .attributes
            .borrow()
            .get("style")
            .map(parse_style_attr)
            .unwrap_or_default(),
        None => StyleDelta::default(),
    }
}

fn tag_defaults(name: &str, style: &mut TextStyle) {
    match name {
        "h1" | "h2" | "h3" | "strong" | "b" => style.bold = true,
        _ => {}
    }
}

fn styled(base: &TextStyle, delta: &StyleDelta) -> TextStyle {
    let mut style = base.clone();
    if let Some(spec) = delta.font_size {
        style.size = match spec {
            FontSizeSpec::Px(px) => px,
            FontSizeSpec::Scale(scale) => base.size * scale,
        };
    }
    if let Some(line_height) = delta.line_height {
        style.line_height = line_height;
    }
    if let Some(bold) = delta.bold {
        style.bold = bold;
    }
    if let Some(color) = delta.color {
        style.color = color;
    }
    if let Some(family) = &delta.family {
        style.family = family.clone();
    }
    style
}

enum InlinePiece {
    Word { text: String, style: TextStyle },
    Break,
}

struct LineRun {
    text: String,
    style: TextStyle,
    offset: f32,
}

struct LineBuilder {
    runs: Vec<LineRun>,
    width: f32,
}

impl LineBuilder {
    fn new() -> Self {
        LineBuilder {
            runs: Vec::new(),
            width: 0.0,
        }
    }

    fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn append(&mut self, text: String, style: TextStyle, word_width: f32, space_width: f32) {
        match self.runs.last_mut() {
            Some(run) if run_style_eq(&run.style, &style) => {
                if space_width > 0.0 {
                    run.text.push(' ');
                }
                run.text.push_str(&text);
            }
            _ => {
                self.runs.push(LineRun {
                    text,
                    style,
                    offset: self.width + space_width,
                });
            }
        }
        self.width += space_width + word_width;
    }
}

fn run_style_eq(a: &TextStyle, b: &TextStyle) -> bool {
    a.size.to_bits() == b.size.to_bits()
        && a.bold == b.bold
        && a.color == b.color
        && a.family == b.family
}

struct BlockFlow {
    /// Bottom of the border box.
    border_end: f32,
    /// Bottom of the margin box, where the next sibling flows.
    flow_end: f32,
}

/// Lays out one section subtree at the given content width.
pub(crate) fn layout_section(
    root: &NodeRef,
    width_px: f32,
    fonts: &FontBook,
    store: &ResourceStore,
) -> DisplayList {
    let mut items = Vec::new();
    let inherited = TextStyle::default();
    // The section's own top margin sits outside the captured box.
    let root_margin_top = element_delta(root).margin.top.unwrap_or(0.0);
    let flow = layout_block(
        root,
        &inherited,
        0.0,
        width_px,
        -root_margin_top,
        fonts,
        store,
        &mut items,
    );
    DisplayList {
        items,
        width: width_px,
        height: flow.border_end.max(1.0),
    }
}

#[allow(clippy::too_many_arguments)]
fn layout_block(
    node: &NodeRef,
    inherited: &TextStyle,
    x: f32,
    width: f32,
    y: f32,
    fonts: &FontBook,
    store: &ResourceStore,
    items: &mut Vec<DisplayItem>,
) -> BlockFlow {
    let delta = element_delta(node);
    let mut base = inherited.clone();
    if let Some(el) = node.as_element() {
        tag_defaults(el.name.local.as_ref(), &mut base);
    }
    let style = styled(&base, &delta);

    let margin_top = delta.margin.top.unwrap_or(0.0);
    let margin_bottom = delta.margin.bottom.unwrap_or(0.0);
    let margin_left = delta.margin.left.unwrap_or(0.0);
    let margin_right = delta.margin.right.unwrap_or(0.0);
    let pad_top = delta.padding.top.unwrap_or(0.0);
    let pad_bottom = delta.padding.bottom.unwrap_or(0.0);
    let pad_left = delta.padding.left.unwrap_or(0.0);
    let pad_right = delta.padding.right.unwrap_or(0.0);

    let border_left = delta.border_left.or(delta.border_all);
    let border_bottom = delta.border_bottom.or(delta.border_all);
    let border_top = delta.border_all;
    let border_right = delta.border_all;
    let bl = border_left.map(|(w, _)| w).unwrap_or(0.0);
    let bb = border_bottom.map(|(w, _)| w).unwrap_or(0.0);
    let bt = border_top.map(|(w, _)| w).unwrap_or(0.0);
    let br = border_right.map(|(w, _)| w).unwrap_or(0.0);

    let border_box_top = y + margin_top;
    let border_x = x + margin_left;
    let border_width = (width - margin_left - margin_right).max(1.0);
    let content_x = border_x + bl + pad_left;
    let content_width = (border_width - bl - br - pad_left - pad_right).max(1.0);
    let mut cursor = border_box_top + bt + pad_top;

    let mut inline: Vec<InlinePiece> = Vec::new();
    for child in node.children() {
        if let Some(text) = child.as_text() {
            collect_words(text.borrow().as_str(), &style, &mut inline);
            continue;
        }
        let Some(el) = child.as_element() else {
            continue;
        };
        let name = el.name.local.as_ref().to_ascii_lowercase();
        match name.as_str() {
            "br" => {
                if inline.is_empty() {
                    cursor += style.size * style.line_height;
                } else {
                    inline.push(InlinePiece::Break);
                }
            }
            "img" => {
                cursor = flush_inline(&mut inline, &style, content_x, content_width, cursor, fonts, items);
                cursor = place_image(&child, content_x, content_width, cursor, store, items);
            }
            "span" | "strong" | "b" | "em" | "a" | "code" => {
                let child_delta = element_delta(&child);
                let mut span_base = style.clone();
                tag_defaults(&name, &mut span_base);
                let span_style = styled(&span_base, &child_delta);
                collect_inline(&child, &span_style, &mut inline);
            }
            _ => {
                cursor = flush_inline(&mut inline, &style, content_x, content_width, cursor, fonts, items);
                let flow = layout_block(
                    &child,
                    &style,
                    content_x,
                    content_width,
                    cursor,
                    fonts,
                    store,
                    items,
                );
                cursor = flow.flow_end;
            }
        }
    }
    cursor = flush_inline(&mut inline, &style, content_x, content_width, cursor, fonts, items);

    let border_end = cursor + pad_bottom + bb;
    if let Some((w, color)) = border_left {
        items.push(DisplayItem::Rect(RectItem {
            x: border_x,
            y: border_box_top,
            width: w,
            height: (border_end - border_box_top).max(0.0),
            color,
        }));
    }
    if let Some((w, color)) = border_bottom {
        items.push(DisplayItem::Rect(RectItem {
            x: border_x,
            y: border_end - w,
            width: border_width,
            height: w,
            color,
        }));
    }
    if let Some((w, color)) = border_top {
        items.push(DisplayItem::Rect(RectItem {
            x: border_x,
            y: border_box_top,
            width: border_width,
            height: w,
            color,
        }));
    }
    if let Some((w, color)) = border_right {
        items.push(DisplayItem::Rect(RectItem {
            x: border_x + border_width - w,
            y: border_box_top,
            width: w,
            height: (border_end - border_box_top).max(0.0),
            color,
        }));
    }

    BlockFlow {
        border_end,
        flow_end: border_end + margin_bottom,
    }
}

fn collect_words(text: &str, style: &TextStyle, pieces: &mut Vec<InlinePiece>) {
    for word in text.split_whitespace() {
        pieces.push(InlinePiece::Word {
            text: word.to_string(),
            style: style.clone(),
        });
    }
}

fn collect_inline(node: &NodeRef, style: &TextStyle, pieces: &mut Vec<InlinePiece>) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            collect_words(text.borrow().as_str(), style, pieces);
            continue;
        }
        let Some(el) = child.as_element() else {
            continue;
        };
        let name = el.name.local.as_ref().to_ascii_lowercase();
        if name == "br" {
            pieces.push(InlinePiece::Break);
            continue;
        }
        let child_delta = element_delta(&child);
        let mut base = style.clone();
        tag_defaults(&name, &mut base);
        let child_style = styled(&base, &child_delta);
        collect_inline(&child, &child_style, pieces);
    }
}

#[allow(clippy::too_many_arguments)]
fn flush_inline(
    pieces: &mut Vec<InlinePiece>,
    block: &TextStyle,
    content_x: f32,
    content_width: f32,
    mut cursor: f32,
    fonts: &FontBook,
    items: &mut Vec<DisplayItem>,
) -> f32 {
    if pieces.is_empty() {
        return cursor;
    }
    let mut line = LineBuilder::new();
    for piece in pieces.drain(..) {
        match piece {
            InlinePiece::Break => {
                if line.is_empty() {
                    cursor += block.size * block.line_height;
                } else {
                    cursor = emit_line(&mut line, block, content_x, cursor, fonts, items);
                }
            }
            InlinePiece::Word { text, style } => {
                let word_width = fonts.measure_text_width(&style.family, style.size, &text);
                let space_width = if line.is_empty() {
                    0.0
                } else {
                    fonts.measure_text_width(&style.family, style.size, " ")
                };
                if !line.is_empty() && line.width + space_width + word_width > content_width {
                    cursor = emit_line(&mut line, block, content_x, cursor, fonts, items);
                    line.append(text, style, word_width, 0.0);
                } else {
                    line.append(text, style, word_width, space_width);
                }
            }
        }
    }
    emit_line(&mut line, block, content_x, cursor, fonts, items)
}

fn emit_line(
    line: &mut LineBuilder,
    block: &TextStyle,
    content_x: f32,
    cursor: f32,
    fonts: &FontBook,
    items: &mut Vec<DisplayItem>,
) -> f32 {
    if line.runs.is_empty() {
        return cursor;
    }
    let mut max_size = 0.0f32;
    let mut lead_family = block.family.clone();
    for run in &line.runs {
        if run.style.size > max_size {
            max_size = run.style.size;
            lead_family = run.style.family.clone();
        }
    }
    let box_height = (max_size * block.line_height).max(max_size);
    let baseline = cursor + (box_height - max_size) / 2.0 + fonts.ascent(&lead_family, max_size);
    for run in line.runs.drain(..) {
        items.push(DisplayItem::Text(TextItem {
            text: run.text,
            x: content_x + run.offset,
            baseline_y: baseline,
            size: run.style.size,
            bold: run.style.bold,
            color: run.style.color,
            family: run.style.family,
        }));
    }
    line.width = 0.0;
    cursor + box_height
}

fn place_image(
    node: &NodeRef,
    content_x: f32,
    content_width: f32,
    cursor: f32,
    store: &ResourceStore,
    items: &mut Vec<DisplayItem>,
) -> f32 {
    let delta = element_delta(node);
    let src = node
        .as_element()
        .and_then(|el| el.attributes.borrow().get("src").map(str::to_string))
        .unwrap_or_default();
    // Unresolved sources keep the HTML replaced-element fallback size.
    let (natural_w, natural_h) = store
        .get(&src)
        .map(|image| (image.pixels.width() as f32, image.pixels.height() as f32))
        .unwrap_or((300.0, 150.0));

    let margin_top = delta.margin.top.unwrap_or(0.0);
    let margin_bottom = delta.margin.bottom.unwrap_or(0.0);
    let border = delta.border_all;
    let border_px = border.map(|(w, _)| w).unwrap_or(0.0);

    let mut draw_w = natural_w.max(1.0);
    let mut draw_h = natural_h.max(1.0);
    let avail = (content_width - 2.0 * border_px).max(1.0);
    if draw_w > avail {
        draw_h = draw_h * avail / draw_w;
        draw_w = avail;
    }
    if let Some(cap) = delta.max_height {
        if cap > 0.0 && draw_h > cap {
            draw_w = draw_w * cap / draw_h;
            draw_h = cap;
        }
    }

    let box_top = cursor + margin_top;
    let img_x = content_x + ((content_width - draw_w) / 2.0).max(0.0);
    let img_y = box_top + border_px;
    if let Some((w, color)) = border {
        items.push(DisplayItem::Rect(RectItem {
            x: img_x - w,
            y: box_top,
            width: draw_w + 2.0 * w,
            height: w,
            color,
        }));
        items.push(DisplayItem::Rect(RectItem {
            x: img_x - w,
            y: img_y + draw_h,
            width: draw_w + 2.0 * w,
            height: w,
            color,
        }));
        items.push(DisplayItem::Rect(RectItem {
            x: img_x - w,
            y: img_y,
            width: w,
            height: draw_h,
            color,
        }));
        items.push(DisplayItem::Rect(RectItem {
            x: img_x + draw_w,
            y: img_y,
            width: w,
            height: draw_h,
            color,
        }));
    }
    items.push(DisplayItem::Image(ImageItem {
        handle: src,
        x: img_x,
        y: img_y,
        width: draw_w,
        height: draw_h,
    }));
    box_top + 2.0 * border_px + draw_h + margin_bottom
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::TendrilSink;

    fn section_node(html: &str) -> NodeRef {
        let document = kuchiki::parse_html().one(html);
        document
            .select_first("[data-pdf-section]")
            .map(|el| el.as_node().clone())
            .unwrap_or(document)
    }

    fn layout(html: &str, width: f32) -> DisplayList {
        let fonts = FontBook::new();
        let store = ResourceStore::new();
        layout_section(&section_node(html), width, &fonts, &store)
    }

    fn text_items(list: &DisplayList) -> Vec<&TextItem> {
        list.items
            .iter()
            .filter_map(|item| match item {
                DisplayItem::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn image_items(list: &DisplayList) -> Vec<&ImageItem> {
        list.items
            .iter()
            .filter_map(|item| match item {
                DisplayItem::Image(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    fn rect_items(list: &DisplayList) -> Vec<&RectItem> {
        list.items
            .iter()
            .filter_map(|item| match item {
                DisplayItem::Rect(rect) => Some(rect),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn wraps_words_at_content_width() {
        // Heuristic metrics: 6px per character at font-size 10.
        let html = r#"<div data-pdf-section="question" style="font-size: 10px; line-height: 1;">aaaa bbbb cccc</div>"#;
        let list = layout(html, 60.0);
        let texts = text_items(&list);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].text, "aaaa bbbb");
        assert_eq!(texts[1].text, "cccc");
        assert!(texts[1].baseline_y > texts[0].baseline_y);
        assert!((texts[0].baseline_y - 8.0).abs() < 0.01);
        assert!((list.height - 20.0).abs() < 0.01);
    }

    #[test]
    fn height_grows_with_content() {
        let short = layout(
            r#"<div data-pdf-section="question" style="font-size: 10px;">one two</div>"#,
            60.0,
        );
        let long = layout(
            r#"<div data-pdf-section="question" style="font-size: 10px;">one two three four five six seven</div>"#,
            60.0,
        );
        assert!(long.height > short.height);
    }

    #[test]
    fn unresolved_image_uses_fallback_size() {
        let html = r#"<div data-pdf-section="question"><img src="missing.png"></div>"#;
        let list = layout(html, 200.0);
        let images = image_items(&list);
        assert_eq!(images.len(), 1);
        // 300x150 intrinsic scaled down to the 200px content box.
        assert!((images[0].width - 200.0).abs() < 0.01);
        assert!((images[0].height - 100.0).abs() < 0.01);
        assert!((list.height - 100.0).abs() < 0.01);
    }

    #[test]
    fn max_height_caps_image_and_preserves_ratio() {
        let html = r#"<div data-pdf-section="question"><img src="missing.png" style="max-height: 50px;"></div>"#;
        let list = layout(html, 200.0);
        let images = image_items(&list);
        assert_eq!(images.len(), 1);
        assert!((images[0].height - 50.0).abs() < 0.01);
        assert!((images[0].width - 100.0).abs() < 0.01);
        // Capped images stay centered in the content box.
        assert!((images[0].x - 50.0).abs() < 0.01);
    }

    #[test]
    fn resolved_image_uses_stored_dimensions() {
        let mut store = ResourceStore::new();
        let uri = crate::resources::tests::png_data_uri(60, 40);
        let handle = store.publish("question", &uri).unwrap();
        let html = format!(r#"<div data-pdf-section="question"><img src="{handle}"></div>"#);
        let fonts = FontBook::new();
        let list = layout_section(&section_node(&html), 200.0, &fonts, &store);
        let images = image_items(&list);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].handle, handle);
        assert!((images[0].width - 60.0).abs() < 0.01);
        assert!((images[0].height - 40.0).abs() < 0.01);
        assert!((images[0].x - 70.0).abs() < 0.01);
    }

    #[test]
    fn border_left_emits_rect_and_indents_text() {
        let html = r#"<div data-pdf-section="question"><div style="border-left: 4px solid #4f46e5; padding-left: 16px; font-size: 10px;">part</div></div>"#;
        let list = layout(html, 200.0);
        let rects = rect_items(&list);
        assert_eq!(rects.len(), 1);
        assert!((rects[0].width - 4.0).abs() < 0.01);
        assert_eq!(
            rects[0].color,
            Rgb {
                r: 0x4f,
                g: 0x46,
                b: 0xe5
            }
        );
        let texts = text_items(&list);
        assert_eq!(texts.len(), 1);
        assert!((texts[0].x - 20.0).abs() < 0.01);
    }

    #[test]
    fn margins_and_padding_offset_content() {
        let html = r#"<div data-pdf-section="question"><div style="margin-top: 12px; padding-top: 8px; font-size: 10px; line-height: 1;">x</div></div>"#;
        let list = layout(html, 200.0);
        let texts = text_items(&list);
        assert_eq!(texts.len(), 1);
        assert!((texts[0].baseline_y - 28.0).abs() < 0.01);
        assert!((list.height - 30.0).abs() < 0.01);
    }

    #[test]
    fn chat_label_sits_above_indented_body() {
        let html = r#"<div data-pdf-section="chat" style="font-size: 10px; line-height: 1;"><span style="font-weight: bold; color: #059669;">Student:</span><div style="margin-left: 16px;">hello there</div></div>"#;
        let list = layout(html, 400.0);
        let texts = text_items(&list);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].text, "Student:");
        assert!(texts[0].bold);
        assert_eq!(
            texts[0].color,
            Rgb {
                r: 0x05,
                g: 0x96,
                b: 0x69
            }
        );
        assert_eq!(texts[1].text, "hello there");
        assert!((texts[1].x - 16.0).abs() < 0.01);
        assert!(texts[1].baseline_y > texts[0].baseline_y);
    }

    #[test]
    fn bold_runs_split_text_items() {
        let html = r#"<div data-pdf-section="question" style="font-size: 10px; line-height: 1;">plain <strong>bold</strong> tail</div>"#;
        let list = layout(html, 400.0);
        let texts = text_items(&list);
        assert_eq!(texts.len(), 3);
        assert!(!texts[0].bold);
        assert!(texts[1].bold);
        assert!(!texts[2].bold);
        // Runs advance left to right on the same baseline.
        assert!(texts[1].x > texts[0].x);
        assert!(texts[2].x > texts[1].x);
        assert!((texts[0].baseline_y - texts[2].baseline_y).abs() < 0.01);
    }
}
