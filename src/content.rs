/// One lettered sub-question of an exam item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamPart {
    pub label: String,
    pub text: String,
    pub points: u32,
}

/// Grading outcome attached to a submission, if one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingResult {
    pub score: u32,
    pub max_score: u32,
    pub feedback: String,
    pub breakdown: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    Asker,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Labels identifying the exam item kind and its curriculum placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamMetadata {
    pub kind_label: String,
    /// Short code used in headings and filenames, e.g. "MR".
    pub kind_code: String,
    pub unit: String,
    pub topic_ids: Vec<String>,
    /// Topics the generated item actually covers, when known. Takes
    /// precedence over `topic_ids` for display and filenames.
    pub actual_topic_ids: Option<Vec<String>>,
}

/// Everything one export renders. Images are inline `data:` URIs or
/// external references; both lists may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamContent {
    pub question_text: String,
    pub parts: Vec<ExamPart>,
    pub question_images: Vec<String>,
    pub scoring_guide_text: String,
    pub scoring_guide_images: Vec<String>,
    pub max_points: u32,
    pub metadata: ExamMetadata,
    pub grading: Option<GradingResult>,
    pub chat: Vec<ChatTurn>,
}

impl ExamMetadata {
    /// Topic ids to present: actuals when present and non-empty, otherwise
    /// the selected set.
    pub fn display_topic_ids(&self) -> &[String] {
        match self.actual_topic_ids.as_deref() {
            Some(actual) if !actual.is_empty() => actual,
            _ => &self.topic_ids,
        }
    }
}
