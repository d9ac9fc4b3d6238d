//! Command execution logic.

use anyhow::Result;

use super::args::{
    BlockedArgs, InitArgs, NextArgs, NoteArgs, PromoteArgs, RunArgs, ShowArgs, StatusArgs,
    SummaryArgs, SyncArgs,
};
use crate::app::App;
use crate::dev_loop::DevLoopOptions;
use crate::domain::IssueStatus;
use crate::error::Error;
use crate::output::{self, OutputMode};
use crate::resolver;
use crate::review::TerminalDecisions;

/// Execute the init command
pub async fn execute_init(args: &InitArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir, args.issues_file.as_deref()).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "devloop_dir": result.devloop_dir,
            "config_file": result.config_file,
            "issues_file": result.issues_file,
            "created_issues_file": result.created_issues_file,
        }))?,
        OutputMode::Text if !args.quiet => {
            println!("Initialized devloop in {}", result.devloop_dir.display());
            println!("  Config: {}", result.config_file.display());
            if result.created_issues_file {
                println!("  Issues: {} (starter document)", result.issues_file.display());
            } else {
                println!("  Issues: {}", result.issues_file.display());
            }
        }
        OutputMode::Text => {}
    }
    Ok(())
}

/// Execute the next command
pub async fn execute_next(app: &App, _args: &NextArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().load().await?;
    let state = resolver::assess(&backlog);
    output::print_next(&state, &backlog, output_mode)?;
    Ok(())
}

/// Execute the show command
pub async fn execute_show(app: &App, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().load().await?;
    let issue = backlog
        .get(&args.issue_id)
        .ok_or_else(|| Error::IssueNotFound(args.issue_id.clone()))?;

    let raw = if args.raw {
        Some(app.store().issue_detail(&args.issue_id).await?.block)
    } else {
        None
    };
    output::print_issue_details(issue, raw.as_deref(), output_mode)?;
    Ok(())
}

/// Execute the summary command
pub async fn execute_summary(app: &App, _args: &SummaryArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().load().await?;
    output::print_summary(&backlog, output_mode)?;
    Ok(())
}

/// Execute the status command
///
/// Goes through the transition engine, so illegal edges are refused and the
/// change is mirrored to the tracker.
pub async fn execute_status(app: &App, args: &StatusArgs, output_mode: OutputMode) -> Result<()> {
    let status = IssueStatus::from(args.status);
    let transition = app.engine().apply(&args.issue_id, status).await?;
    output::print_transitions(std::slice::from_ref(&transition), output_mode)?;
    Ok(())
}

/// Execute the note command
pub async fn execute_note(app: &App, args: &NoteArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().update_dev_notes(&args.issue_id, &args.text).await?;
    let issue = backlog
        .get(&args.issue_id)
        .ok_or_else(|| Error::IssueNotFound(args.issue_id.clone()))?;

    match output_mode {
        OutputMode::Json => output::print_json(issue)?,
        OutputMode::Text => output::print_message(&format!("Updated dev notes of {}", issue.id))?,
    }
    Ok(())
}

/// Execute the promote command
pub async fn execute_promote(app: &App, _args: &PromoteArgs, output_mode: OutputMode) -> Result<()> {
    let promoted = app.engine().promote().await?;
    output::print_transitions(&promoted, output_mode)?;
    Ok(())
}

/// Execute the blocked command
pub async fn execute_blocked(app: &App, _args: &BlockedArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().load().await?;
    let report = resolver::blocked_report(&backlog);
    output::print_blocked(&report, output_mode)?;
    Ok(())
}

/// Execute the run command
pub async fn execute_run(app: &App, args: &RunArgs, output_mode: OutputMode) -> Result<()> {
    let backlog = app.store().load().await?;
    if let Err(e) = resolver::ensure_acyclic(&backlog) {
        tracing::warn!(error = %e, "Issues in a cycle will never become eligible");
    }

    let mut dev_loop = app.dev_loop(Box::new(TerminalDecisions::new()));
    let options = DevLoopOptions {
        once: args.once,
        max_aborted_steps: args.max_aborted_steps,
    };
    let outcome = dev_loop.run(options).await?;
    output::print_loop_outcome(&outcome, output_mode)?;
    Ok(())
}

/// Execute the sync command
pub async fn execute_sync(app: &App, args: &SyncArgs, output_mode: OutputMode) -> Result<()> {
    let bridge = app.sync_bridge();
    if !bridge.is_enabled() {
        match output_mode {
            OutputMode::Json => output::print_json(&serde_json::json!({ "enabled": false }))?,
            OutputMode::Text => output::print_message(
                "No tracker configured (set tracker.name in .devloop/config.yaml)",
            )?,
        }
        return Ok(());
    }

    let backlog = app.store().load().await?;
    if args.status {
        let state = bridge.state().await?;
        output::print_sync_status(&backlog, &state, output_mode)?;
    } else if args.dry_run {
        let actions = bridge.plan(&backlog).await?;
        output::print_sync_plan(&actions, output_mode)?;
    } else {
        let report = bridge.mirror(&backlog).await;
        output::print_sync_report(&report, output_mode)?;
    }
    Ok(())
}
