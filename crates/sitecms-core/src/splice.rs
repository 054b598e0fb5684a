//! Marker-based HTML splicing for stored page content.
//!
//! Pages carry stable HTML-comment markers (for example `<!-- Hero Section -->`)
//! that act as splice points. Splicing is pure string surgery over the first
//! occurrence of a marker; when a marker is missing the input is returned
//! untouched so callers can skip the write entirely.

use serde::{Deserialize, Serialize};

/// Result of a splice attempt. `MarkerNotFound` carries the unmodified input
/// contract: the caller observed no marker, so nothing was changed.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpliceOutcome {
    Spliced {
        content: String,
        /// Byte offset the fragment was inserted at.
        at: usize,
    },
    MarkerNotFound {
        marker: String,
    },
}

impl SpliceOutcome {
    #[must_use]
    pub fn spliced(&self) -> bool {
        matches!(self, Self::Spliced { .. })
    }

    /// New content when the splice happened, `None` otherwise.
    #[must_use]
    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Spliced { content, .. } => Some(content),
            Self::MarkerNotFound { .. } => None,
        }
    }
}

/// Insert `fragment` immediately after the first occurrence of `marker`.
#[must_use]
pub fn insert_after_marker(content: &str, marker: &str, fragment: &str) -> SpliceOutcome {
    let Some(idx) = content.find(marker) else {
        return SpliceOutcome::MarkerNotFound { marker: marker.to_string() };
    };
    let at = idx + marker.len();
    let mut out = String::with_capacity(content.len() + fragment.len());
    out.push_str(&content[..at]);
    out.push_str(fragment);
    out.push_str(&content[at..]);
    SpliceOutcome::Spliced { content: out, at }
}

/// Insert `fragment` immediately before the first occurrence of `marker`.
#[must_use]
pub fn insert_before_marker(content: &str, marker: &str, fragment: &str) -> SpliceOutcome {
    let Some(at) = content.find(marker) else {
        return SpliceOutcome::MarkerNotFound { marker: marker.to_string() };
    };
    let mut out = String::with_capacity(content.len() + fragment.len());
    out.push_str(&content[..at]);
    out.push_str(fragment);
    out.push_str(&content[at..]);
    SpliceOutcome::Spliced { content: out, at }
}

/// Replace everything between the first occurrence of `start` and the first
/// occurrence of `end` after it with `fragment`. Both markers are kept, so a
/// replacement can be re-run against its own output.
#[must_use]
pub fn replace_between_markers(
    content: &str,
    start: &str,
    end: &str,
    fragment: &str,
) -> SpliceOutcome {
    let Some(start_idx) = content.find(start) else {
        return SpliceOutcome::MarkerNotFound { marker: start.to_string() };
    };
    let after_start = start_idx + start.len();
    let Some(end_offset) = content[after_start..].find(end) else {
        return SpliceOutcome::MarkerNotFound { marker: end.to_string() };
    };
    let end_idx = after_start + end_offset;

    let mut out = String::with_capacity(content.len() + fragment.len());
    out.push_str(&content[..after_start]);
    out.push_str(fragment);
    out.push_str(&content[end_idx..]);
    SpliceOutcome::Spliced { content: out, at: after_start }
}

/// A splice operation against page content, decoupled from where the content
/// lives so stores and tools can share one definition.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SpliceOp {
    InsertAfter { marker: String, fragment: String },
    InsertBefore { marker: String, fragment: String },
    ReplaceBetween { start: String, end: String, fragment: String },
}

impl SpliceOp {
    #[must_use]
    pub fn apply(&self, content: &str) -> SpliceOutcome {
        match self {
            Self::InsertAfter { marker, fragment } => {
                insert_after_marker(content, marker, fragment)
            }
            Self::InsertBefore { marker, fragment } => {
                insert_before_marker(content, marker, fragment)
            }
            Self::ReplaceBetween { start, end, fragment } => {
                replace_between_markers(content, start, end, fragment)
            }
        }
    }
}

/// Markers present in `content`, in order of first occurrence. Useful for
/// inspecting a page before choosing a splice point.
#[must_use]
pub fn list_markers(content: &str) -> Vec<String> {
    let mut markers = Vec::new();
    let mut rest = content;
    let mut base = 0;
    while let Some(open) = rest.find("<!--") {
        let abs_open = base + open;
        let Some(close) = content[abs_open..].find("-->") else {
            break;
        };
        let marker = &content[abs_open..abs_open + close + 3];
        markers.push(marker.to_string());
        base = abs_open + close + 3;
        rest = &content[base..];
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PAGE: &str = "<div>\n<!-- Hero Section -->\n<h1>Welcome</h1>\n<!-- About Section -->\n<p>About us</p>\n</div>";

    #[test]
    fn insert_after_matches_slice_contract() {
        let marker = "<!-- Hero Section -->";
        let fragment = "\n<section>Quick contact</section>";
        let outcome = insert_after_marker(PAGE, marker, fragment);
        let idx = match PAGE.find(marker) {
            Some(idx) => idx + marker.len(),
            None => panic!("fixture must contain the marker"),
        };
        let expected = format!("{}{}{}", &PAGE[..idx], fragment, &PAGE[idx..]);
        assert_eq!(outcome, SpliceOutcome::Spliced { content: expected, at: idx });
    }

    #[test]
    fn missing_marker_leaves_input_untouched() {
        let outcome = insert_after_marker(PAGE, "<!-- Pricing Section -->", "<p>x</p>");
        assert_eq!(
            outcome,
            SpliceOutcome::MarkerNotFound { marker: "<!-- Pricing Section -->".to_string() }
        );
        assert!(outcome.into_content().is_none());
    }

    #[test]
    fn duplicate_marker_uses_first_occurrence() {
        let content = "a <!-- M --> b <!-- M --> c";
        let outcome = insert_after_marker(content, "<!-- M -->", "X");
        match outcome {
            SpliceOutcome::Spliced { content, at } => {
                assert_eq!(content, "a <!-- M -->X b <!-- M --> c");
                assert_eq!(at, 12);
            }
            SpliceOutcome::MarkerNotFound { marker } => {
                panic!("marker should be found: {marker}")
            }
        }
    }

    #[test]
    fn replace_between_keeps_both_markers() {
        let outcome = replace_between_markers(
            PAGE,
            "<!-- Hero Section -->",
            "<!-- About Section -->",
            "\n<h1>New hero</h1>\n",
        );
        match outcome {
            SpliceOutcome::Spliced { content, .. } => {
                assert!(content.contains("<!-- Hero Section -->"));
                assert!(content.contains("<!-- About Section -->"));
                assert!(content.contains("<h1>New hero</h1>"));
                assert!(!content.contains("<h1>Welcome</h1>"));
            }
            SpliceOutcome::MarkerNotFound { marker } => {
                panic!("marker should be found: {marker}")
            }
        }
    }

    #[test]
    fn replace_between_requires_end_after_start() {
        let content = "<!-- End --> middle <!-- Start --> tail";
        let outcome = replace_between_markers(content, "<!-- Start -->", "<!-- End -->", "X");
        assert_eq!(
            outcome,
            SpliceOutcome::MarkerNotFound { marker: "<!-- End -->".to_string() }
        );
    }

    #[test]
    fn list_markers_reports_comments_in_order() {
        assert_eq!(
            list_markers(PAGE),
            vec!["<!-- Hero Section -->".to_string(), "<!-- About Section -->".to_string()]
        );
        assert!(list_markers("<p>no comments</p>").is_empty());
    }

    proptest! {
        #[test]
        fn insert_after_preserves_prefix_and_suffix(
            prefix in "[a-z ]{0,20}",
            suffix in "[a-z ]{0,20}",
            fragment in "[A-Z]{1,10}",
        ) {
            let marker = "<!-- M -->";
            let content = format!("{prefix}{marker}{suffix}");
            match insert_after_marker(&content, marker, &fragment) {
                SpliceOutcome::Spliced { content: out, at } => {
                    prop_assert_eq!(at, prefix.len() + marker.len());
                    prop_assert_eq!(out, format!("{prefix}{marker}{fragment}{suffix}"));
                }
                SpliceOutcome::MarkerNotFound { marker } => {
                    prop_assert!(false, "marker should be found: {}", marker);
                }
            }
        }

        #[test]
        fn replace_between_is_idempotent(fragment in "[a-z]{1,12}") {
            let start = "<!-- S -->";
            let end = "<!-- E -->";
            let content = format!("head {start} old body {end} tail");
            let first = match replace_between_markers(&content, start, end, &fragment) {
                SpliceOutcome::Spliced { content, .. } => content,
                SpliceOutcome::MarkerNotFound { marker } => {
                    return Err(TestCaseError::fail(format!("marker missing: {marker}")));
                }
            };
            let second = match replace_between_markers(&first, start, end, &fragment) {
                SpliceOutcome::Spliced { content, .. } => content,
                SpliceOutcome::MarkerNotFound { marker } => {
                    return Err(TestCaseError::fail(format!("marker missing: {marker}")));
                }
            };
            prop_assert_eq!(first, second);
        }
    }
}
