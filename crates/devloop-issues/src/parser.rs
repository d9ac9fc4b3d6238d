//! Line-oriented parser for backlog documents.
//!
//! The parser walks the document once, copying every byte into a
//! [`SegmentBuilder`]. Verbatim text accumulates in a pending buffer; each
//! editable value is pushed as its own segment so the document can later be
//! re-rendered with only that value replaced.

use crate::document::{normalize_notes, CriterionRecord, IssueRecord, IssuesDocument, Slots};
use crate::error::ParseError;
use crate::{parse_issue_ref, ISSUE_ID_PREFIX, STATUS_LITERALS};
use std::collections::HashSet;

const STATUS_FIELD: &str = "Status";
const DEPENDENCIES_FIELD: &str = "Dependencies";
const DEV_NOTES_FIELD: &str = "Dev notes";

struct SegmentBuilder {
    segments: Vec<String>,
    pending: String,
}

impl SegmentBuilder {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            pending: String::new(),
        }
    }

    fn text(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Close the pending verbatim segment, returning the index of the next segment.
    fn flush(&mut self) -> usize {
        if !self.pending.is_empty() {
            self.segments.push(std::mem::take(&mut self.pending));
        }
        self.segments.len()
    }

    fn slot(&mut self, value: &str) -> usize {
        self.flush();
        self.segments.push(value.to_string());
        self.segments.len() - 1
    }

    /// Split trailing whitespace off the pending buffer and return it.
    fn take_trailing_whitespace(&mut self) -> String {
        let keep = self.pending.trim_end().len();
        self.pending.split_off(keep)
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.segments
    }
}

/// An issue block whose closing separator has not been reached yet.
struct OpenIssue {
    id: String,
    ordinal: u64,
    title: String,
    line: usize,
    block_start: usize,
    status: Option<(String, usize)>,
    dependencies: Option<Vec<String>>,
    criteria: Vec<(CriterionRecord, usize)>,
    metadata: Vec<(String, String)>,
    /// Raw dev-notes text collected so far, while inside the section.
    notes_buffer: Option<String>,
    notes: Option<(String, usize)>,
}

impl OpenIssue {
    fn duplicate(&self, field: &str, line: usize) -> ParseError {
        ParseError::DuplicateField {
            field: field.to_string(),
            id: self.id.clone(),
            line,
        }
    }

    /// End the dev-notes section, pushing its body as a slot.
    fn finish_notes(&mut self, builder: &mut SegmentBuilder) {
        if let Some(buffer) = self.notes_buffer.take() {
            let body_len = buffer.trim_end().len();
            let slot = builder.slot(&buffer[..body_len]);
            builder.text(&buffer[body_len..]);
            self.notes = Some((normalize_notes(&buffer), slot));
        }
    }

    fn close(mut self, builder: &mut SegmentBuilder) -> Result<IssueRecord, ParseError> {
        self.finish_notes(builder);

        let Some((status, status_slot)) = self.status else {
            return Err(ParseError::MissingStatus {
                id: self.id,
                line: self.line,
            });
        };

        let trailing = builder.take_trailing_whitespace();
        let (dev_notes, notes_slot, notes_anchor) = match self.notes {
            Some((notes, slot)) => (notes, Some(slot), None),
            None => {
                // Two empty segments: section markup, then the body.
                let anchor = builder.slot("");
                builder.slot("");
                (String::new(), None, Some(anchor))
            }
        };
        let block_end = builder.flush();
        builder.text(&trailing);

        let (criteria, criteria_slots): (Vec<CriterionRecord>, Vec<usize>) =
            self.criteria.into_iter().unzip();

        Ok(IssueRecord {
            id: self.id,
            ordinal: self.ordinal,
            title: self.title,
            status,
            dependencies: self.dependencies.unwrap_or_default(),
            criteria,
            dev_notes,
            metadata: self.metadata,
            line: self.line,
            slots: Slots {
                status: status_slot,
                criteria: criteria_slots,
                dev_notes: notes_slot,
                notes_anchor,
                block: self.block_start..block_end,
            },
        })
    }
}

pub(crate) fn parse(text: &str) -> Result<IssuesDocument, ParseError> {
    let mut builder = SegmentBuilder::new();
    let mut records: Vec<IssueRecord> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut spec_ref: Option<String> = None;
    let mut open: Option<OpenIssue> = None;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let line_no = index + 1;
        let content = strip_line_ending(line);

        if is_separator(content) {
            if let Some(issue) = open.take() {
                records.push(issue.close(&mut builder)?);
            }
            builder.text(line);
            continue;
        }

        if let Some((id, ordinal, title)) = parse_heading(content, line_no)? {
            if let Some(previous) = &open {
                return Err(ParseError::MultipleHeadings {
                    previous: previous.id.clone(),
                    line: line_no,
                });
            }
            if spec_ref.is_none() {
                return Err(ParseError::MissingSpecReference { line: line_no });
            }
            if !seen_ids.insert(id.clone()) {
                return Err(ParseError::DuplicateIssue { id, line: line_no });
            }

            let block_start = builder.flush();
            builder.text(line);
            open = Some(OpenIssue {
                id,
                ordinal,
                title,
                line: line_no,
                block_start,
                status: None,
                dependencies: None,
                criteria: Vec::new(),
                metadata: Vec::new(),
                notes_buffer: None,
                notes: None,
            });
            continue;
        }

        let Some(issue) = open.as_mut() else {
            if spec_ref.is_none() && records.is_empty() {
                spec_ref = parse_spec_line(content);
            }
            builder.text(line);
            continue;
        };

        let field = field_name(content);

        if let Some(buffer) = issue.notes_buffer.as_mut() {
            if field.is_none() && !is_markdown_heading(content) {
                buffer.push_str(line);
                continue;
            }
            issue.finish_notes(&mut builder);
        }

        match field {
            Some((name, value_offset)) if name.eq_ignore_ascii_case(STATUS_FIELD) => {
                if issue.status.is_some() {
                    return Err(issue.duplicate(STATUS_FIELD, line_no));
                }
                let rest = &content[value_offset..];
                let value = rest.trim();
                if !STATUS_LITERALS.contains(&value) {
                    return Err(ParseError::InvalidStatus {
                        value: value.to_string(),
                        line: line_no,
                    });
                }
                let start = value_offset + (rest.len() - rest.trim_start().len());
                let end = start + value.len();
                builder.text(&line[..start]);
                let slot = builder.slot(value);
                builder.text(&line[end..]);
                issue.status = Some((value.to_string(), slot));
            }
            Some((name, value_offset)) if name.eq_ignore_ascii_case(DEPENDENCIES_FIELD) => {
                if issue.dependencies.is_some() {
                    return Err(issue.duplicate(DEPENDENCIES_FIELD, line_no));
                }
                let value = content[value_offset..].trim();
                let dependencies =
                    parse_dependencies(value).ok_or_else(|| ParseError::InvalidDependencies {
                        value: value.to_string(),
                        line: line_no,
                    })?;
                issue.dependencies = Some(dependencies);
                builder.text(line);
            }
            Some((name, value_offset)) if name.eq_ignore_ascii_case(DEV_NOTES_FIELD) => {
                if issue.notes.is_some() {
                    return Err(issue.duplicate(DEV_NOTES_FIELD, line_no));
                }
                builder.text(&line[..value_offset]);
                issue.notes_buffer = Some(line[value_offset..].to_string());
            }
            Some((name, value_offset)) => {
                let value = content[value_offset..].trim();
                if !value.is_empty() {
                    issue.metadata.push((name.to_string(), value.to_string()));
                }
                builder.text(line);
            }
            None => match checkbox(content) {
                Some((mark_offset, checked, text)) => {
                    builder.text(&line[..mark_offset]);
                    let slot = builder.slot(&line[mark_offset..=mark_offset]);
                    builder.text(&line[mark_offset + 1..]);
                    issue.criteria.push((
                        CriterionRecord {
                            text: text.to_string(),
                            checked,
                        },
                        slot,
                    ));
                }
                None => builder.text(line),
            },
        }
    }

    if let Some(issue) = open.take() {
        records.push(issue.close(&mut builder)?);
    }

    let spec_ref = spec_ref.ok_or(ParseError::MissingSpecReference { line: 1 })?;
    tracing::debug!(issues = records.len(), spec = %spec_ref, "Parsed backlog document");

    Ok(IssuesDocument {
        segments: builder.finish(),
        spec_ref,
        records,
        line_ending: detect_line_ending(text),
    })
}

/// The terminator of the first line, defaulting to `\n`.
fn detect_line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(end) if text[..end].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// A literal `---` line separates issue blocks.
pub(crate) fn is_separator(content: &str) -> bool {
    strip_line_ending(content) == "---"
}

/// Any markdown heading line. Headings close a dev-notes section.
pub(crate) fn is_markdown_heading(content: &str) -> bool {
    content.trim_start().starts_with('#')
}

/// Recognize a markdown heading containing `ISSUE-<n>: <title>`.
///
/// # Errors
///
/// `ParseError::InvalidIssueId` when the identifier's number does not fit an
/// ordinal.
pub(crate) fn parse_heading(
    content: &str,
    line_no: usize,
) -> Result<Option<(String, u64, String)>, ParseError> {
    if !is_markdown_heading(content) {
        return Ok(None);
    }
    let heading = content.trim_start();
    let text = heading.trim_start_matches('#');

    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(ISSUE_ID_PREFIX) {
        let start = search_from + found;
        let digits_start = start + ISSUE_ID_PREFIX.len();
        let digits_len = text[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let id_end = digits_start + digits_len;

        if digits_len > 0 && text[id_end..].starts_with(':') {
            let id = &text[start..id_end];
            let Some(ordinal) = parse_issue_ref(id) else {
                return Err(ParseError::InvalidIssueId {
                    id: id.to_string(),
                    line: line_no,
                });
            };
            let title = text[id_end + 1..].trim().to_string();
            return Ok(Some((id.to_string(), ordinal, title)));
        }
        search_from = digits_start;
    }
    Ok(None)
}

/// Recognize the `Spec:` reference line and extract the path it names.
///
/// Accepts `Spec: path`, `**Spec:** path`, block-quoted forms, backticked
/// paths and markdown links (`[name](path)`).
fn parse_spec_line(content: &str) -> Option<String> {
    let line = content.trim().trim_start_matches('>').trim();
    let rest = line
        .strip_prefix("**Spec:**")
        .or_else(|| line.strip_prefix("**Spec**:"))
        .or_else(|| line.strip_prefix("Spec:"))?;

    let value = rest.trim().trim_matches('`');
    let value = match (value.find("]("), value.strip_suffix(')')) {
        (Some(split), Some(inner)) if value.starts_with('[') => &inner[split + 2..],
        _ => value,
    };

    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Recognize a `**Name:** value` line, optionally written as a list item.
///
/// Returns the field name and the byte offset where its value starts.
pub(crate) fn field_name(content: &str) -> Option<(&str, usize)> {
    let trimmed = content.trim_start();
    let item = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);
    let inner = item.strip_prefix("**")?;
    let close = inner.find(":**")?;
    let name = &inner[..close];
    if name.is_empty() || name.contains('*') {
        return None;
    }

    let name_start = content.len() - inner.len();
    Some((name, name_start + close + ":**".len()))
}

/// Recognize a checkbox list item.
///
/// Returns the byte offset of the mark character, whether it is ticked, and
/// the criterion text.
fn checkbox(content: &str) -> Option<(usize, bool, &str)> {
    let trimmed = content.trim_start();
    let indent = content.len() - trimmed.len();
    if !(trimmed.starts_with("- [") || trimmed.starts_with("* [")) {
        return None;
    }

    let bytes = trimmed.as_bytes();
    if bytes.len() < 5 || bytes[4] != b']' {
        return None;
    }
    let checked = match bytes[3] {
        b' ' => false,
        b'x' | b'X' => true,
        _ => return None,
    };

    Some((indent + 3, checked, trimmed[5..].trim()))
}

/// Parse a dependency list: `none`, empty, or comma-separated issue references.
///
/// A reference may be followed by a note (`ISSUE-2 (schema)`).
fn parse_dependencies(value: &str) -> Option<Vec<String>> {
    if value.is_empty() || value == "-" || value.eq_ignore_ascii_case("none") {
        return Some(Vec::new());
    }

    let mut dependencies: Vec<String> = Vec::new();
    for item in value.split(',') {
        let token = item
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
        parse_issue_ref(token)?;
        if !dependencies.iter().any(|d| d == token) {
            dependencies.push(token.to_string());
        }
    }
    Some(dependencies)
}
