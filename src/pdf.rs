//! Single-pass PDF writer.
//!
//! Every page is one JPEG XObject drawn onto a fixed frame, so the whole
//! document reduces to a small, predictable object set: catalog, page tree
//! and a shared resource dictionary up front, an image/content/page triple
//! per page, and the info dictionary last. Coordinates are formatted from
//! integer milli-pt, never from floats, so byte output is stable across
//! runs and platforms.

use crate::assemble::AssembledPage;
use crate::geom::Mm;

const PDF_HEADER: &[u8] = b"%PDF-1.4\n";

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const RESOURCES_ID: usize = 3;

/// Object id of page `index`'s image XObject; content and page dictionary
/// follow at +1 and +2.
fn page_triple_base(index: usize) -> usize {
    RESOURCES_ID + 1 + index * 3
}

/// Serializes assembled pages into a complete PDF byte stream.
pub(crate) fn write_pdf(pages: &[AssembledPage], producer: &str) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::with_capacity(4 + pages.len() * 3);

    objects.push(format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID));

    let kids = pages
        .iter()
        .enumerate()
        .map(|(index, _)| format!("{} 0 R", page_triple_base(index) + 2))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!(
        "<< /Type /Pages /Count {} /Kids [{}] >>",
        pages.len(),
        kids
    ));

    let xobjects = pages
        .iter()
        .enumerate()
        .map(|(index, _)| format!("/Im{} {} 0 R", index + 1, page_triple_base(index)))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!("<< /XObject << {} >> >>", xobjects));

    for (index, page) in pages.iter().enumerate() {
        let content_id = page_triple_base(index) + 1;
        objects.push(image_object(page));
        objects.push(stream_object(&page_content(page, index)));
        objects.push(format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
            PAGES_ID,
            fmt_pt(page.plan.page.width),
            fmt_pt(page.plan.page.height),
            RESOURCES_ID,
            content_id
        ));
    }

    let info_id = objects.len() + 1;
    objects.push(format!("<< /Producer ({}) >>", escape_pdf_string(producer)));

    build_pdf(objects, CATALOG_ID, info_id)
}

/// Places the page image inside the margins. PDF origin is bottom-left, the
/// plan's is top-left, so y flips against the page height.
fn page_content(page: &AssembledPage, index: usize) -> String {
    let plan = &page.plan;
    let draw_y = plan.page.height - plan.image.y - plan.image.height;
    let mut out = String::new();
    out.push_str("q\n");
    out.push_str(&format!(
        "{} 0 0 {} {} {} cm\n",
        fmt_pt(plan.image.width),
        fmt_pt(plan.image.height),
        fmt_pt(plan.image.x),
        fmt_pt(draw_y)
    ));
    out.push_str(&format!("/Im{} Do\n", index + 1));
    out.push_str("Q\n");
    out
}

// JPEG scan data rides along unchanged under DCTDecode; the hex layer keeps
// the file free of binary stream bytes.
fn image_object(page: &AssembledPage) -> String {
    let stream_data = encode_stream_data(&page.jpeg);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /DCTDecode] >>
stream
{}
endstream",
        page.width_px,
        page.height_px,
        stream_data.as_bytes().len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn stream_object(content: &str) -> String {
    let length = content.as_bytes().len();
    format!("<< /Length {} >>\nstream\n{}\nendstream", length, content)
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn build_pdf(objects: Vec<String>, catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(PDF_HEADER);
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::new();
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        let obj_id = index + 1;
        out.extend_from_slice(format!("{} 0 obj\n", obj_id).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
        objects.len() + 1,
        catalog_id,
        info_id,
        xref_start
    );
    out.extend_from_slice(trailer.as_bytes());

    out
}

fn fmt_pt(value: Mm) -> String {
    format_milli(value.to_pt_milli_i64())
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}
