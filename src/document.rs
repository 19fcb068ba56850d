use crate::config::ExportOptions;
use crate::content::{ChatRole, ExamContent};
use crate::filename::natural_sorted;

/// Stable section identity. Variant order is the canonical page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Question,
    ScoringGuide,
    ScoringGuideImages,
    Feedback,
    Chat,
}

impl SectionKind {
    pub const CANONICAL_ORDER: [SectionKind; 5] = [
        SectionKind::Question,
        SectionKind::ScoringGuide,
        SectionKind::ScoringGuideImages,
        SectionKind::Feedback,
        SectionKind::Chat,
    ];

    /// Value of the `data-pdf-section` attribute on the section root.
    pub fn key(self) -> &'static str {
        match self {
            SectionKind::Question => "question",
            SectionKind::ScoringGuide => "scoring-guide",
            SectionKind::ScoringGuideImages => "scoring-guide-images",
            SectionKind::Feedback => "feedback",
            SectionKind::Chat => "chat",
        }
    }

    pub fn from_key(key: &str) -> Option<SectionKind> {
        SectionKind::CANONICAL_ORDER
            .into_iter()
            .find(|kind| kind.key() == key)
    }
}

/// One renderable section. `include == false` means the section is never
/// mounted: no markup, no page, no readiness work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub html: String,
    pub images: Vec<String>,
    pub include: bool,
}

/// Ordered sections for one export. Built once, immutable afterwards; the
/// Nth included section becomes page N of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub sections: Vec<Section>,
}

impl ExportDocument {
    pub fn included(&self) -> impl Iterator<Item = &Section> + '_ {
        self.sections.iter().filter(|s| s.include)
    }

    pub fn included_count(&self) -> usize {
        self.included().count()
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Inner markup of the whole document, included sections only, in
    /// canonical order.
    pub fn body_html(&self) -> String {
        let mut out = String::new();
        for section in self.included() {
            out.push_str(&section.html);
        }
        out
    }
}

/// Build the canonical document for one export. The label becomes the lead
/// segment of the question header, e.g. "AP Chemistry FRQ".
pub fn build_document(
    content: &ExamContent,
    options: &ExportOptions,
    product_label: &str,
) -> ExportDocument {
    let mut sections = Vec::with_capacity(SectionKind::CANONICAL_ORDER.len());
    for kind in SectionKind::CANONICAL_ORDER {
        let include = match kind {
            SectionKind::Question => true,
            SectionKind::ScoringGuide => !content.scoring_guide_text.trim().is_empty(),
            SectionKind::ScoringGuideImages => !content.scoring_guide_images.is_empty(),
            SectionKind::Feedback => options.include_feedback && content.grading.is_some(),
            SectionKind::Chat => options.include_chat_history && !content.chat.is_empty(),
        };
        let html = if include {
            section_html(kind, content, product_label)
        } else {
            String::new()
        };
        let images = match kind {
            SectionKind::Question => content.question_images.clone(),
            SectionKind::ScoringGuideImages => content.scoring_guide_images.clone(),
            _ => Vec::new(),
        };
        sections.push(Section {
            kind,
            html,
            images,
            include,
        });
    }
    ExportDocument { sections }
}

fn section_html(kind: SectionKind, content: &ExamContent, product_label: &str) -> String {
    let mut out = String::new();
    out.push_str(&section_open_tag(kind));
    match kind {
        SectionKind::Question => push_question(&mut out, content, product_label),
        SectionKind::ScoringGuide => {
            push_heading(&mut out, "Official Scoring Guide");
            push_paragraphs(&mut out, &content.scoring_guide_text);
        }
        SectionKind::ScoringGuideImages => {
            push_heading(&mut out, "Scoring Guide Diagrams");
            for (idx, src) in content.scoring_guide_images.iter().enumerate() {
                push_figure(&mut out, src, idx + 1, 500);
            }
        }
        SectionKind::Feedback => push_feedback(&mut out, content),
        SectionKind::Chat => push_chat(&mut out, content),
    }
    out.push_str("</div>\n");
    out
}

/// Every section root carries its key, a guard padding for hanging glyph
/// descenders, and (outside the question section) the manual page-break
/// directive that the capture step later neutralizes.
fn section_open_tag(kind: SectionKind) -> String {
    let mut style = String::new();
    if kind != SectionKind::Question {
        style.push_str("page-break-before: always; ");
    }
    style.push_str("margin-bottom: 32px; padding-bottom: 40px");
    format!(
        "<div data-pdf-section=\"{}\" style=\"{}\">\n",
        kind.key(),
        style
    )
}

fn push_question(out: &mut String, content: &ExamContent, product_label: &str) {
    let meta = &content.metadata;
    out.push_str(
        "<div style=\"border-bottom: 2px solid #4f46e5; padding-bottom: 16px; margin-bottom: 24px\">\n",
    );
    out.push_str(&format!(
        "<h1 style=\"font-size: 18pt; font-weight: bold; color: #111827; margin: 0 0 8px 0\">{} - {}</h1>\n",
        html_escape(product_label),
        html_escape(&meta.kind_code)
    ));
    let topics = meta.display_topic_ids();
    if !topics.is_empty() {
        let joined = natural_sorted(topics)
            .iter()
            .map(|t| html_escape(t))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "<p style=\"font-size: 11pt; color: #6b7280; margin: 0\">Topics: {}</p>\n",
            joined
        ));
    }
    out.push_str("</div>\n");

    push_heading(out, "Question");
    push_paragraphs(out, &content.question_text);
    for (idx, src) in content.question_images.iter().enumerate() {
        push_figure(out, src, idx + 1, 400);
    }
    for part in &content.parts {
        out.push_str(
            "<div style=\"border-left: 4px solid #4f46e5; padding-left: 16px; margin-bottom: 24px\">\n",
        );
        out.push_str(&format!(
            "<div><span style=\"font-weight: bold; font-size: 12pt\">{}</span> <span style=\"font-size: 10pt; color: #6b7280\">[{} point{}]</span></div>\n",
            html_escape(&part.label),
            part.points,
            if part.points == 1 { "" } else { "s" }
        ));
        push_paragraphs(out, &part.text);
        out.push_str("</div>\n");
    }
}

fn push_feedback(out: &mut String, content: &ExamContent) {
    push_heading(out, "Student Score & Feedback");
    if let Some(grading) = &content.grading {
        out.push_str(&format!(
            "<p style=\"font-size: 16pt; font-weight: bold; color: #4f46e5; margin: 0 0 16px 0\">Score: {} / {}</p>\n",
            grading.score, grading.max_score
        ));
        push_subheading(out, "Feedback Summary:");
        push_paragraphs(out, &grading.feedback);
        push_subheading(out, "Detailed Breakdown:");
        push_paragraphs(out, &grading.breakdown);
    }
}

fn push_chat(out: &mut String, content: &ExamContent) {
    push_heading(out, "Tutor Conversation");
    for turn in &content.chat {
        let (label, color) = match turn.role {
            ChatRole::Asker => ("Student:", "#059669"),
            ChatRole::Assistant => ("Tutor:", "#4f46e5"),
        };
        out.push_str("<div style=\"margin-bottom: 12px\">\n");
        out.push_str(&format!(
            "<span style=\"font-weight: bold; color: {}\">{}</span>\n",
            color, label
        ));
        out.push_str("<div style=\"margin-left: 16px\">\n");
        push_paragraphs(out, &turn.text);
        out.push_str("</div>\n</div>\n");
    }
}

fn push_heading(out: &mut String, text: &str) {
    out.push_str(&format!(
        "<h2 style=\"font-size: 14pt; font-weight: bold; color: #111827; margin: 0 0 16px 0\">{}</h2>\n",
        html_escape(text)
    ));
}

fn push_subheading(out: &mut String, text: &str) {
    out.push_str(&format!(
        "<h3 style=\"font-size: 12pt; font-weight: bold; color: #111827; margin: 16px 0 8px 0\">{}</h3>\n",
        html_escape(text)
    ));
}

/// Plain-text body rendering: blank lines split paragraphs, single
/// newlines become explicit breaks.
fn push_paragraphs(out: &mut String, text: &str) {
    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let escaped = html_escape(block).replace('\n', "<br>");
        out.push_str(&format!(
            "<p style=\"font-size: 11pt; line-height: 1.7; margin: 0 0 12px 0\">{}</p>\n",
            escaped
        ));
    }
}

fn push_figure(out: &mut String, src: &str, number: usize, max_height_px: u32) {
    out.push_str("<div style=\"margin-bottom: 16px\">\n");
    out.push_str(&format!(
        "<img src=\"{}\" alt=\"Figure {}\" style=\"max-height: {}px; border: 1px solid #e5e7eb\">\n",
        html_escape(src),
        number,
        max_height_px
    ));
    out.push_str(&format!(
        "<p style=\"font-size: 10pt; color: #6b7280; margin: 4px 0 0 0\">Figure {}</p>\n",
        number
    ));
    out.push_str("</div>\n");
}

pub(crate) fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
