//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::domain::IssueStatus;

/// Issue status for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    /// Waiting on dependencies
    Backlog,
    /// May be picked up
    Ready,
    /// Being implemented
    #[value(name = "in_progress", alias = "in-progress")]
    InProgress,
    /// Waiting for review
    #[value(name = "in_review", alias = "in-review")]
    InReview,
    /// Approved
    Done,
}

impl std::fmt::Display for StatusArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(IssueStatus::from(*self).normalized())
    }
}

impl From<StatusArg> for IssueStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Backlog => IssueStatus::Backlog,
            StatusArg::Ready => IssueStatus::Ready,
            StatusArg::InProgress => IssueStatus::InProgress,
            StatusArg::InReview => IssueStatus::InReview,
            StatusArg::Done => IssueStatus::Done,
        }
    }
}

impl From<IssueStatus> for StatusArg {
    fn from(status: IssueStatus) -> Self {
        match status {
            IssueStatus::Backlog => StatusArg::Backlog,
            IssueStatus::Ready => StatusArg::Ready,
            IssueStatus::InProgress => StatusArg::InProgress,
            IssueStatus::InReview => StatusArg::InReview,
            IssueStatus::Done => StatusArg::Done,
        }
    }
}
