//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `init`: Create `.devloop/` and a starter issues document
//! - `next`: Show what the loop would work on next
//! - `show`: Show one issue (`--raw` for the block as written)
//! - `summary`: One line per issue with status counts
//! - `status`: Move an issue along the transition graph
//! - `note`: Append to an issue's dev notes
//! - `promote`: Move Backlog issues whose dependencies are Done to Ready
//! - `blocked`: Show unmet dependencies and cycles
//! - `run`: Run the dev loop
//! - `sync`: Mirror statuses to the tracker
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--file`: Use this issues document instead of the configured one
//!
//! # Example
//!
//! ```bash
//! devloop init --issues-file specs/auth.issues.md
//! devloop summary
//! devloop status ISSUE-3 ready
//! devloop run --once
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{
    BlockedArgs, InitArgs, NextArgs, NoteArgs, PromoteArgs, RunArgs, ShowArgs, StatusArgs,
    SummaryArgs, SyncArgs,
};
pub use types::StatusArg;
pub use validators::{validate_issue_id, validate_issues_file, validate_note};

/// devloop - human-gated development loop over a markdown issue backlog
///
/// Picks the next eligible issue, hands it to an implementation agent, and
/// holds it for review before marking it Done.
#[derive(Parser, Debug)]
#[command(name = "devloop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Issues document to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize devloop in the current directory
    ///
    /// Creates `.devloop/config.yaml` and, when missing, a starter issues
    /// document.
    Init(InitArgs),

    /// Show the issue the loop would work on next
    Next(NextArgs),

    /// Show an issue
    Show(ShowArgs),

    /// Show every issue with its status and dependencies
    Summary(SummaryArgs),

    /// Change an issue's status
    ///
    /// Only transitions of the lifecycle are accepted:
    /// backlog -> ready -> in_progress -> in_review -> done | ready.
    Status(StatusArgs),

    /// Append to an issue's dev notes
    Note(NoteArgs),

    /// Promote Backlog issues whose dependencies are all Done
    Promote(PromoteArgs),

    /// Show issues waiting on dependencies, and dependency cycles
    Blocked(BlockedArgs),

    /// Run the development loop
    ///
    /// Works through eligible issues one at a time, stopping at the review
    /// gate after each implementation.
    Run(RunArgs),

    /// Mirror issue statuses to the configured tracker
    Sync(SyncArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = OutputMode::from_flag(self.json);
        let file = self.file.as_deref();

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args, output_mode).await,
            Some(Commands::Next(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_next(&app, args, output_mode).await
            }
            Some(Commands::Show(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_show(&app, args, output_mode).await
            }
            Some(Commands::Summary(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_summary(&app, args, output_mode).await
            }
            Some(Commands::Status(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_status(&app, args, output_mode).await
            }
            Some(Commands::Note(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_note(&app, args, output_mode).await
            }
            Some(Commands::Promote(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_promote(&app, args, output_mode).await
            }
            Some(Commands::Blocked(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_blocked(&app, args, output_mode).await
            }
            Some(Commands::Run(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_run(&app, args, output_mode).await
            }
            Some(Commands::Sync(args)) => {
                let app = App::from_directory(&std::env::current_dir()?, file).await?;
                execute::execute_sync(&app, args, output_mode).await
            }
            None => {
                println!("devloop: human-gated development loop");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
