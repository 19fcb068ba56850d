//! Download filenames for exported documents.

use std::cmp::Ordering;

use crate::content::ExamMetadata;

/// `"{product} - {kind code} - unit {ids}.pdf"`. The unit segment is dropped
/// when no topic ids are known, never left as a dangling separator.
pub fn export_filename(product_label: &str, meta: &ExamMetadata) -> String {
    match unit_segment(meta.display_topic_ids()) {
        Some(units) => format!("{} - {} - {}.pdf", product_label, meta.kind_code, units),
        None => format!("{} - {}.pdf", product_label, meta.kind_code),
    }
}

fn unit_segment(ids: &[String]) -> Option<String> {
    match ids {
        [] => None,
        [only] => Some(format!("unit {}", only)),
        many => Some(format!("unit {}", natural_sorted(many).join(", "))),
    }
}

/// Numeric-aware, case-insensitive ordering: `1.2` sorts before `1.10`.
pub(crate) fn natural_sorted(ids: &[String]) -> Vec<String> {
    let mut sorted = ids.to_vec();
    sorted.sort_by(|a, b| natural_cmp(a, b));
    sorted
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (left, next_i) = take_number(a, i);
            let (right, next_j) = take_number(b, j);
            match left.cmp(&right) {
                Ordering::Equal => {
                    i = next_i;
                    j = next_j;
                }
                other => return other,
            }
        } else {
            match a[i].to_ascii_lowercase().cmp(&b[j].to_ascii_lowercase()) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                other => return other,
            }
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn take_number(bytes: &[u8], start: usize) -> (u64, usize) {
    let mut end = start;
    let mut value: u64 = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add(u64::from(bytes[end] - b'0'));
        end += 1;
    }
    (value, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(selected: &[&str], actual: Option<&[&str]>) -> ExamMetadata {
        ExamMetadata {
            kind_label: "Multiple Representations".to_string(),
            kind_code: "MR".to_string(),
            unit: "Unit 1".to_string(),
            topic_ids: selected.iter().map(|s| s.to_string()).collect(),
            actual_topic_ids: actual.map(|ids| ids.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn multi_topic_filename_sorts_ids_naturally() {
        let meta = meta(&["1.10", "1.2", "1.1"], None);
        assert_eq!(
            export_filename("AP Physics FRQ", &meta),
            "AP Physics FRQ - MR - unit 1.1, 1.2, 1.10.pdf"
        );
    }

    #[test]
    fn single_topic_keeps_its_given_form() {
        let meta = meta(&["3.4"], None);
        assert_eq!(
            export_filename("AP Physics FRQ", &meta),
            "AP Physics FRQ - MR - unit 3.4.pdf"
        );
    }

    #[test]
    fn empty_topics_drop_the_unit_segment() {
        let meta = meta(&[], None);
        assert_eq!(export_filename("AP Physics FRQ", &meta), "AP Physics FRQ - MR.pdf");
    }

    #[test]
    fn actual_topics_override_selected_ones() {
        let meta = meta(&["1.1"], Some(&["2.10", "2.5"]));
        assert_eq!(
            export_filename("AP Physics FRQ", &meta),
            "AP Physics FRQ - MR - unit 2.5, 2.10.pdf"
        );
    }

    #[test]
    fn natural_order_is_case_insensitive() {
        let ids = vec!["b2".to_string(), "A10".to_string(), "a2".to_string()];
        assert_eq!(natural_sorted(&ids), vec!["a2", "A10", "b2"]);
    }

    #[test]
    fn shorter_id_wins_when_prefixes_match() {
        let ids = vec!["1.2a".to_string(), "1.2".to_string()];
        assert_eq!(natural_sorted(&ids), vec!["1.2", "1.2a"]);
    }
}
