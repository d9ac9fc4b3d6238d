//! Typed view over a backlog document.
//!
//! [`IssuesDocument`] pairs the parsed [`IssueRecord`]s with the segment list
//! the text was split into. Editing a record rewrites only the segment that
//! holds the edited value; everything else renders exactly as it was read.

use crate::error::{Error, ParseError, Result};
use crate::{DEV_NOTES_PLACEHOLDER, STATUS_LITERALS};
use std::fmt;

/// Field label inserted when dev notes are written to an issue that has no section yet.
const DEV_NOTES_LABEL: &str = "**Dev notes:**";

/// One acceptance-criterion checkbox line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionRecord {
    /// Text after the checkbox.
    pub text: String,
    /// Whether the box is ticked (`[x]` or `[X]`).
    pub checked: bool,
}

/// Segment indices of the editable values of one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slots {
    /// Segment holding the status literal.
    pub(crate) status: usize,
    /// Segments holding each checkbox mark, in criterion order.
    pub(crate) criteria: Vec<usize>,
    /// Segment holding the dev-notes body (leading whitespace included).
    pub(crate) dev_notes: Option<usize>,
    /// Empty segment where a dev-notes section is inserted when missing.
    pub(crate) notes_anchor: Option<usize>,
    /// Segment range covering the block from the heading to its last content.
    pub(crate) block: std::ops::Range<usize>,
}

/// One issue block as parsed from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    /// Identifier as written (`ISSUE-3`).
    pub id: String,
    /// Numeric part of the identifier.
    pub ordinal: u64,
    /// Heading text after `ISSUE-<n>:`.
    pub title: String,
    /// Status literal, always one of [`STATUS_LITERALS`].
    pub status: String,
    /// Referenced issue identifiers, in the order written, without duplicates.
    pub dependencies: Vec<String>,
    /// Acceptance-criterion checkboxes.
    pub criteria: Vec<CriterionRecord>,
    /// Trimmed dev-notes body; empty when absent or still the template placeholder.
    pub dev_notes: String,
    /// Other `**Field:** value` lines in the block (complexity, layers, ...).
    pub metadata: Vec<(String, String)>,
    /// 1-based line of the heading.
    pub line: usize,
    pub(crate) slots: Slots,
}

impl IssueRecord {
    /// Look up a metadata field by name, ignoring ASCII case.
    pub fn metadata(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A parsed backlog document that can be edited without reformatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuesDocument {
    pub(crate) segments: Vec<String>,
    pub(crate) spec_ref: String,
    pub(crate) records: Vec<IssueRecord>,
    pub(crate) line_ending: &'static str,
}

impl IssuesDocument {
    /// Parse document text.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing the first grammar violation found.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseError> {
        crate::parser::parse(text)
    }

    /// The parent spec document named on the `Spec:` line.
    pub fn spec_ref(&self) -> &str {
        &self.spec_ref
    }

    /// Line terminator used for inserted text, taken from the first line read.
    pub fn line_ending(&self) -> &'static str {
        self.line_ending
    }

    /// All issue records in document order.
    pub fn records(&self) -> &[IssueRecord] {
        &self.records
    }

    /// Find a record by identifier.
    pub fn record(&self, id: &str) -> Option<&IssueRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// The raw text of an issue block, from its heading to its last content line.
    pub fn block_text(&self, id: &str) -> Option<String> {
        let record = self.record(id)?;
        let text: String = self.segments[record.slots.block.clone()].concat();
        Some(text.trim().to_string())
    }

    /// Render the document back to text.
    pub fn render(&self) -> String {
        self.segments.concat()
    }

    /// Replace an issue's status literal.
    ///
    /// Returns `Ok(false)` when the issue already has that status.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownIssue` if no record has the identifier
    /// - `Error::InvalidValue` if `status` is not one of [`STATUS_LITERALS`]
    pub fn set_status(&mut self, id: &str, status: &str) -> Result<bool> {
        let index = self.position(id)?;
        if !STATUS_LITERALS.contains(&status) {
            return Err(Error::InvalidValue {
                id: id.to_string(),
                reason: format!("'{status}' is not a status literal"),
            });
        }

        let record = &mut self.records[index];
        if record.status == status {
            return Ok(false);
        }
        self.segments[record.slots.status] = status.to_string();
        record.status = status.to_string();
        tracing::trace!(issue = id, status, "Status slot rewritten");
        Ok(true)
    }

    /// Tick or clear one acceptance-criterion checkbox (zero-based index).
    ///
    /// Returns `Ok(false)` when the box is already in the requested state.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownIssue` if no record has the identifier
    /// - `Error::CriterionOutOfRange` if the index is past the last checkbox
    pub fn set_criterion(&mut self, id: &str, index: usize, checked: bool) -> Result<bool> {
        let position = self.position(id)?;
        let record = &mut self.records[position];
        let Some(&slot) = record.slots.criteria.get(index) else {
            return Err(Error::CriterionOutOfRange {
                id: id.to_string(),
                index,
            });
        };

        if record.criteria[index].checked == checked {
            return Ok(false);
        }
        self.segments[slot] = if checked { "x" } else { " " }.to_string();
        record.criteria[index].checked = checked;
        Ok(true)
    }

    /// Replace an issue's dev notes.
    ///
    /// When `notes` extends the current notes, the new text is appended after
    /// the existing bytes. A missing `**Dev notes:**` section is added at the
    /// end of the issue block. Inserted lines use the document's line ending.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownIssue` if no record has the identifier
    /// - `Error::InvalidValue` if a line of `notes` would be read back as a
    ///   separator, a markdown heading, or a metadata field
    pub fn set_dev_notes(&mut self, id: &str, notes: &str) -> Result<bool> {
        let index = self.position(id)?;
        let notes = notes.trim().replace("\r\n", "\n");
        if let Some(reason) = structural_line(&notes) {
            return Err(Error::InvalidValue {
                id: id.to_string(),
                reason,
            });
        }

        let line_ending = self.line_ending;
        let record = &mut self.records[index];
        if record.dev_notes == notes {
            return Ok(false);
        }

        let (slot, body) = match record.slots.dev_notes {
            Some(slot) => {
                let raw = &self.segments[slot];
                let body = match notes.strip_prefix(record.dev_notes.as_str()) {
                    Some(rest) if !record.dev_notes.is_empty() => {
                        format!("{raw}{}", rest.replace('\n', line_ending))
                    }
                    _ if notes.is_empty() => String::new(),
                    _ => format!(" {}", notes.replace('\n', line_ending)),
                };
                (slot, body)
            }
            None => {
                let Some(anchor) = record.slots.notes_anchor else {
                    return Err(Error::InvalidValue {
                        id: id.to_string(),
                        reason: "issue block has no place for a dev-notes section".to_string(),
                    });
                };
                self.segments[anchor] = format!("{line_ending}{line_ending}{DEV_NOTES_LABEL}");
                record.slots.dev_notes = Some(anchor + 1);
                record.slots.notes_anchor = None;
                (anchor + 1, format!(" {}", notes.replace('\n', line_ending)))
            }
        };

        self.segments[slot] = body;
        record.dev_notes = notes;
        Ok(true)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::UnknownIssue(id.to_string()))
    }
}

impl fmt::Display for IssuesDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Normalize a raw dev-notes body into the value exposed on [`IssueRecord`].
///
/// Line endings are reported as `\n` whatever the document uses.
pub(crate) fn normalize_notes(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == DEV_NOTES_PLACEHOLDER {
        String::new()
    } else {
        trimmed.replace("\r\n", "\n")
    }
}

/// Explain why `text` cannot be stored as notes, if any of its lines would
/// change how the document parses.
fn structural_line(text: &str) -> Option<String> {
    for line in text.lines() {
        if crate::parser::is_separator(line) {
            return Some("notes cannot contain a `---` line".to_string());
        }
        if crate::parser::is_markdown_heading(line) {
            return Some(format!("notes cannot contain a heading: '{}'", line.trim()));
        }
        if crate::parser::field_name(line).is_some() {
            return Some(format!("notes cannot start a line with a field: '{}'", line.trim()));
        }
    }
    None
}
