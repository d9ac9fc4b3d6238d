//! Error types for devloop operations.

use crate::domain::{IssueId, IssueStatus};
use devloop_issues::ParseError;
use std::io;
use thiserror::Error;

/// The error type for devloop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backlog document violates the grammar. Never repaired automatically.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A status change outside the legal transition graph.
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Issue whose status was to change.
        id: IssueId,
        /// Status read from the document just before the change.
        from: IssueStatus,
        /// Requested status.
        to: IssueStatus,
    },

    /// Issue not found in the backlog.
    #[error("Issue not found: {0}")]
    IssueNotFound(IssueId),

    /// Text that is not an `ISSUE-<n>` identifier.
    #[error("Invalid issue id '{0}' (expected ISSUE-<n>)")]
    InvalidIssueId(String),

    /// Text that is not one of the five statuses.
    #[error("Unknown status '{0}' (expected Backlog, Ready, In Progress, In Review or Done)")]
    UnknownStatus(String),

    /// The dependency graph contains one or more cycles.
    #[error("Dependency cycle detected: {}", format_cycles(.0))]
    CycleDetected(Vec<Vec<IssueId>>),

    /// The tracker rejected or failed a request.
    #[error("Sync failure: {0}")]
    Sync(String),

    /// Version-control operation failed.
    #[error("Version control error: {0}")]
    Vcs(String),

    /// The implementation agent could not be run.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document refused an edit.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Review input closed before a decision was made.
    #[error("Review interrupted: input closed before a decision was made")]
    Interrupted,

    /// Too many consecutive loop steps were aborted.
    #[error("Loop stopped after {aborted} consecutive aborted steps")]
    Stalled {
        /// Number of aborted steps in a row.
        aborted: usize,
    },
}

impl From<devloop_issues::Error> for Error {
    fn from(err: devloop_issues::Error) -> Self {
        match err {
            devloop_issues::Error::Io(e) => Self::Io(e),
            devloop_issues::Error::Parse(e) => Self::Parse(e),
            devloop_issues::Error::UnknownIssue(id) => match IssueId::parse(&id) {
                Some(id) => Self::IssueNotFound(id),
                None => Self::InvalidIssueId(id),
            },
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Self::Vcs(err.message().to_string())
    }
}

fn format_cycles(cycles: &[Vec<IssueId>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            cycle
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" <-> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized Result type for devloop operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_members() {
        let err = Error::CycleDetected(vec![vec![IssueId::from_ordinal(1), IssueId::from_ordinal(2)]]);
        assert_eq!(
            err.to_string(),
            "Dependency cycle detected: ISSUE-1 <-> ISSUE-2"
        );
    }

    #[test]
    fn test_unknown_issue_maps_to_not_found() {
        let err: Error = devloop_issues::Error::UnknownIssue("ISSUE-4".to_string()).into();
        assert!(matches!(err, Error::IssueNotFound(id) if id.ordinal() == 4));
    }

    #[test]
    fn test_parse_error_is_shown_verbatim() {
        let parse = ParseError::MissingStatus {
            id: "ISSUE-2".to_string(),
            line: 9,
        };
        let err: Error = devloop_issues::Error::Parse(parse.clone()).into();
        assert!(err.to_string().ends_with(&parse.to_string()));
    }
}
