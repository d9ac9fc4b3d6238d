//! Signals the implementation agent leaves in its output.
//!
//! - `<criterion-met>N</criterion-met>`: acceptance criterion `N` (1-based) holds
//! - `<dev-notes>text</dev-notes>`: notes to record on the issue

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CRITERION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<criterion-met>\s*(\d{1,4})\s*</criterion-met>").unwrap());

static DEV_NOTES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dev-notes>\s*(.*?)\s*</dev-notes>").unwrap());

/// Signals extracted from one agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    /// Zero-based criterion indices, ascending and deduplicated.
    pub satisfied_criteria: Vec<usize>,
    /// Dev notes, all `<dev-notes>` blocks joined by newlines.
    pub dev_notes: Option<String>,
}

/// Extract every signal from `text`.
pub fn parse_signals(text: &str) -> Signals {
    let satisfied: BTreeSet<usize> = CRITERION_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter_map(|n| n.checked_sub(1))
        .collect();

    let notes: Vec<&str> = DEV_NOTES_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .filter(|s| !s.is_empty())
        .collect();

    Signals {
        satisfied_criteria: satisfied.into_iter().collect(),
        dev_notes: (!notes.is_empty()).then(|| notes.join("\n")),
    }
}
