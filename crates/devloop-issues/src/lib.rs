//! Parser and format-preserving writer for `.issues.md` backlog documents.
//!
//! A backlog document is hand-edited markdown: a `Spec:` reference line at the
//! top, then one block per issue separated by `---` lines. Each block opens with
//! a heading containing `ISSUE-<n>: <title>` and carries bold metadata fields
//! (`**Status:**`, `**Dependencies:**`, `**Dev notes:**`) and acceptance
//! criteria checkbox lines.
//!
//! [`IssuesDocument`] keeps the original text as a list of segments. The values
//! this crate can edit (status literals, checkbox marks, dev notes) live in their
//! own segments, so rendering an unedited document reproduces it byte for byte
//! and an edit never touches bytes outside its own value.
//!
//! # Example
//!
//! ```
//! use devloop_issues::IssuesDocument;
//!
//! let text = "Spec: specs/login.md\n\n---\n\n### ISSUE-1: Login form\n\n**Status:** Ready\n\n- [ ] Renders\n";
//! let mut doc = IssuesDocument::parse(text).unwrap();
//! assert_eq!(doc.render(), text);
//!
//! doc.set_status("ISSUE-1", "In Progress").unwrap();
//! assert!(doc.render().contains("**Status:** In Progress"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod document;
pub mod error;
mod parser;

pub use atomic::write_atomic;
pub use document::{CriterionRecord, IssueRecord, IssuesDocument};
pub use error::{Error, ParseError, Result};

/// The five status literals accepted on a `**Status:**` line, in lifecycle order.
pub const STATUS_LITERALS: [&str; 5] = ["Backlog", "Ready", "In Progress", "In Review", "Done"];

/// Placeholder text that issue templates put in an empty dev-notes section.
///
/// It is reported as empty notes and replaced on the first append.
pub const DEV_NOTES_PLACEHOLDER: &str = "_(filled by dev-loop during implementation)_";

/// Prefix shared by every issue identifier (`ISSUE-12`).
pub const ISSUE_ID_PREFIX: &str = "ISSUE-";

/// Parse an `ISSUE-<digits>` reference, returning its ordinal.
///
/// Trailing text is not allowed; callers strip punctuation first.
pub fn parse_issue_ref(token: &str) -> Option<u64> {
    let digits = token.strip_prefix(ISSUE_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
