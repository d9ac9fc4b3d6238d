//! Error types for devloop-issues operations.

use std::io;
use thiserror::Error;

/// A violation of the backlog document grammar.
///
/// Every variant carries the 1-based line number where the problem was found
/// so the message can be shown to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `Spec:` reference line appears before the first issue heading.
    #[error("line {line}: missing `Spec:` reference line before the first issue")]
    MissingSpecReference {
        /// Line of the first issue heading (or 1 for a document without issues).
        line: usize,
    },

    /// An issue block has no `**Status:**` line.
    #[error("line {line}: {id} has no **Status:** line")]
    MissingStatus {
        /// Issue identifier.
        id: String,
        /// Line of the issue heading.
        line: usize,
    },

    /// A `**Status:**` line holds something other than the five status literals.
    #[error(
        "line {line}: invalid status '{value}' (expected one of Backlog, Ready, In Progress, In Review, Done)"
    )]
    InvalidStatus {
        /// The offending value.
        value: String,
        /// Line of the status field.
        line: usize,
    },

    /// A single-valued field appears twice within one issue block.
    #[error("line {line}: duplicate **{field}:** field in {id}")]
    DuplicateField {
        /// Field name without markup.
        field: String,
        /// Issue identifier.
        id: String,
        /// Line of the second occurrence.
        line: usize,
    },

    /// Two issue blocks share an identifier.
    #[error("line {line}: duplicate issue id {id}")]
    DuplicateIssue {
        /// Issue identifier.
        id: String,
        /// Line of the second heading.
        line: usize,
    },

    /// The `**Dependencies:**` value is neither `none` nor a list of issue references.
    #[error("line {line}: invalid dependency list '{value}' (expected `none` or ISSUE-<n>, ...)")]
    InvalidDependencies {
        /// The offending value.
        value: String,
        /// Line of the dependencies field.
        line: usize,
    },

    /// An issue heading whose number is too large to be an ordinal.
    #[error("line {line}: issue id {id} is out of range")]
    InvalidIssueId {
        /// Identifier as written.
        id: String,
        /// Line of the heading.
        line: usize,
    },

    /// Two issue headings appear in one block without a `---` separator.
    #[error("line {line}: issue heading inside the block of {previous}; separate issues with `---`")]
    MultipleHeadings {
        /// Issue whose block was still open.
        previous: String,
        /// Line of the second heading.
        line: usize,
    },
}

impl ParseError {
    /// The 1-based line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            Self::MissingSpecReference { line }
            | Self::MissingStatus { line, .. }
            | Self::InvalidStatus { line, .. }
            | Self::DuplicateField { line, .. }
            | Self::DuplicateIssue { line, .. }
            | Self::InvalidDependencies { line, .. }
            | Self::InvalidIssueId { line, .. }
            | Self::MultipleHeadings { line, .. } => *line,
        }
    }
}

/// The error type for devloop-issues operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing a document.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The document does not follow the backlog grammar.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// An edit named an issue the document does not contain.
    #[error("Unknown issue: {0}")]
    UnknownIssue(String),

    /// An edit named an acceptance criterion the issue does not have.
    #[error("{id} has no acceptance criterion #{index}")]
    CriterionOutOfRange {
        /// Issue identifier.
        id: String,
        /// Zero-based index that was requested.
        index: usize,
    },

    /// A value would change the document structure if written.
    #[error("Invalid value for {id}: {reason}")]
    InvalidValue {
        /// Issue identifier.
        id: String,
        /// Why the value was refused.
        reason: String,
    },
}

/// A specialized Result type for devloop-issues operations.
pub type Result<T> = std::result::Result<T, Error>;
