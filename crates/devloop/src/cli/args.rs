//! CLI argument structs for all commands.

use clap::Parser;

use super::types::StatusArg;
use super::validators::{validate_issue_id, validate_issues_file, validate_note};
use crate::dev_loop::DEFAULT_MAX_ABORTED_STEPS;
use crate::domain::IssueId;

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Issues document, relative to the project root
    ///
    /// A starter document is written when the file does not exist yet.
    #[arg(long, value_parser = validate_issues_file)]
    pub issues_file: Option<String>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `next` command
#[derive(Parser, Debug, Clone, Default)]
pub struct NextArgs {}

/// Arguments for the `show` command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Issue ID (e.g., ISSUE-3)
    #[arg(value_parser = validate_issue_id)]
    pub issue_id: IssueId,

    /// Print the issue block exactly as written in the document
    #[arg(long)]
    pub raw: bool,
}

/// Arguments for the `summary` command
#[derive(Parser, Debug, Clone, Default)]
pub struct SummaryArgs {}

/// Arguments for the `status` command
#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Issue ID (e.g., ISSUE-3)
    #[arg(value_parser = validate_issue_id)]
    pub issue_id: IssueId,

    /// New status; must be a legal transition from the current one
    #[arg(value_enum)]
    pub status: StatusArg,
}

/// Arguments for the `note` command
#[derive(Parser, Debug, Clone)]
pub struct NoteArgs {
    /// Issue ID (e.g., ISSUE-3)
    #[arg(value_parser = validate_issue_id)]
    pub issue_id: IssueId,

    /// Text appended to the issue's dev notes
    #[arg(value_parser = validate_note)]
    pub text: String,
}

/// Arguments for the `promote` command
#[derive(Parser, Debug, Clone, Default)]
pub struct PromoteArgs {}

/// Arguments for the `blocked` command
#[derive(Parser, Debug, Clone, Default)]
pub struct BlockedArgs {}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Stop after one issue has been approved or skipped
    #[arg(long)]
    pub once: bool,

    /// Consecutive aborted steps tolerated before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ABORTED_STEPS)]
    pub max_aborted_steps: usize,
}

/// Arguments for the `sync` command
#[derive(Parser, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Show what would be pushed without contacting the tracker
    #[arg(long, conflicts_with = "status")]
    pub dry_run: bool,

    /// Show which issues are linked to tracker items
    #[arg(long)]
    pub status: bool,
}
