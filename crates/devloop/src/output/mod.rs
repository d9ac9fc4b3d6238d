//! Output formatting for CLI commands.
//!
//! Every printer has a human-readable text form and a JSON form for scripts.
//! Text printers write to any [`Write`] and take an [`OutputConfig`], so tests
//! render into a buffer with colors off.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers (semantic colors, status icons)
//! - `json`: JSON shapes for programmatic output

pub mod color;
mod json;

use crate::dev_loop::LoopOutcome;
use crate::domain::{Backlog, Issue, IssueId, IssueStatus};
use crate::resolver::{BacklogState, BlockedReport};
use crate::sync::{SyncAction, SyncReport, SyncState};
use crate::transition::Transition;
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, colored_status_icon, colorize_id, colorize_status, cyan, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

const DEFAULT_TERMINAL_WIDTH: u16 = 80;
const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new `OutputConfig` with explicit values.
    pub fn new(max_width: usize, use_ascii: bool, use_colors: bool) -> Self {
        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }

    /// Create an `OutputConfig` by reading from environment variables.
    ///
    /// Reads:
    /// - `DEVLOOP_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `DEVLOOP_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `DEVLOOP_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let max_width = match env::var("DEVLOOP_MAX_WIDTH") {
            Ok(s) if !s.is_empty() => match s.parse() {
                Ok(width) => width,
                Err(_) => {
                    tracing::warn!(
                        env_var = "DEVLOOP_MAX_WIDTH",
                        value = %s,
                        default = DEFAULT_MAX_CONTENT_WIDTH,
                        "Invalid value, using default"
                    );
                    DEFAULT_MAX_CONTENT_WIDTH
                }
            },
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        let use_ascii = match env::var("DEVLOOP_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "DEVLOOP_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // NO_COLOR (https://no-color.org/) wins over DEVLOOP_COLOR.
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("DEVLOOP_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Get the current terminal width, falling back to default if detection fails.
fn get_terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(DEFAULT_TERMINAL_WIDTH as usize, |(w, _)| w.0 as usize)
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

impl OutputMode {
    /// `Json` when `json` is set.
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

fn dispatch<T, J>(mode: OutputMode, text: T, json: J) -> io::Result<()>
where
    T: FnOnce(&mut io::StdoutLock<'static>, &OutputConfig) -> io::Result<()>,
    J: FnOnce(&mut io::StdoutLock<'static>) -> io::Result<()>,
{
    let mut handle = io::stdout().lock();
    match mode {
        OutputMode::Text => text(&mut handle, &OutputConfig::from_env()),
        OutputMode::Json => json(&mut handle),
    }
}

/// Print one line per issue followed by status counts.
pub fn print_summary(backlog: &Backlog, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_summary_text(w, backlog, config),
        |w| json::print_summary_json(w, backlog),
    )
}

/// Print an issue with full details (for the show command).
///
/// With `raw`, the issue block is printed exactly as written in the document.
pub fn print_issue_details(
    issue: &Issue,
    raw: Option<&str>,
    mode: OutputMode,
) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| match raw {
            Some(block) => write!(w, "{}", ensure_newline(block)),
            None => {
                let width = get_terminal_width().min(config.max_width);
                print_issue_details_text(w, issue, width, config)
            }
        },
        |w| json::print_issue_json(w, issue, raw),
    )
}

/// Print what the loop would do next.
pub fn print_next(state: &BacklogState, backlog: &Backlog, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_next_text(w, state, backlog, config),
        |w| json::write_json(w, state),
    )
}

/// Print the blocked report.
pub fn print_blocked(report: &BlockedReport, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_blocked_text(w, report, config),
        |w| json::write_json(w, report),
    )
}

/// Print applied transitions.
pub fn print_transitions(transitions: &[Transition], mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_transitions_text(w, transitions, config),
        |w| json::write_json(w, &transitions),
    )
}

/// Print a sync preview.
pub fn print_sync_plan(actions: &[SyncAction], mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_sync_plan_text(w, actions, config),
        |w| json::write_json(w, &actions),
    )
}

/// Print the result of a sync.
pub fn print_sync_report(report: &SyncReport, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_sync_report_text(w, report, config),
        |w| json::write_json(w, report),
    )
}

/// Print which issues are linked to tracker items.
pub fn print_sync_status(backlog: &Backlog, state: &SyncState, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_sync_status_text(w, backlog, state, config),
        |w| json::print_sync_status_json(w, backlog, state),
    )
}

/// Print how a loop run ended.
pub fn print_loop_outcome(outcome: &LoopOutcome, mode: OutputMode) -> io::Result<()> {
    dispatch(
        mode,
        |w, config| print_loop_outcome_text(w, outcome, config),
        |w| json::write_json(w, outcome),
    )
}

/// Print a simple message
pub fn print_message(msg: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{msg}")
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    json::write_json(&mut handle, value)
}

// ============================================================================
// Text Formatting
// ============================================================================

fn ensure_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a IssueId>, config: &OutputConfig) -> String {
    ids.into_iter()
        .map(|id| colorize_id(id.as_str(), config))
        .collect::<Vec<_>>()
        .join(", ")
}

fn issue_line(issue: &Issue, config: &OutputConfig) -> String {
    let mut line = format!(
        "{} {} {} [{}]",
        colored_status_icon(issue.status, config),
        colorize_id(issue.id.as_str(), config),
        issue.title,
        colorize_status(issue.status, config)
    );
    if !issue.dependencies.is_empty() {
        line.push_str(&format!(
            " {} {}",
            dimmed("after", config),
            join_ids(&issue.dependencies, config)
        ));
    }
    line
}

fn print_summary_text<W: Write>(w: &mut W, backlog: &Backlog, config: &OutputConfig) -> io::Result<()> {
    writeln!(w, "{} {}", dimmed("Spec:", config), backlog.spec_ref())?;
    writeln!(w)?;
    for issue in backlog.issues() {
        writeln!(w, "{}", issue_line(issue, config))?;
    }

    let counts: Vec<String> = backlog
        .status_counts()
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(status, count)| format!("{count} {}", colorize_status(status, config)))
        .collect();
    writeln!(w)?;
    writeln!(
        w,
        "{} issue(s): {}",
        backlog.issues().len(),
        if counts.is_empty() {
            "none".to_string()
        } else {
            counts.join(", ")
        }
    )?;
    Ok(())
}

fn print_issue_details_text<W: Write>(
    w: &mut W,
    issue: &Issue,
    content_width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {}: {}",
        colored_status_icon(issue.status, config),
        colorize_id(issue.id.as_str(), config),
        issue.title
    )?;
    writeln!(w, "{} {}", dimmed("Status:", config), colorize_status(issue.status, config))?;
    if !issue.dependencies.is_empty() {
        writeln!(
            w,
            "{} {}",
            dimmed("Depends on:", config),
            join_ids(&issue.dependencies, config)
        )?;
    }
    for (key, value) in &issue.metadata {
        writeln!(w, "{} {}", dimmed(&format!("{key}:"), config), value)?;
    }

    if !issue.acceptance_criteria.is_empty() {
        let met = issue.acceptance_criteria.iter().filter(|c| c.satisfied).count();
        writeln!(w)?;
        writeln!(
            w,
            "{} ({met}/{}):",
            bold("Acceptance Criteria", config),
            issue.acceptance_criteria.len()
        )?;
        for (index, criterion) in issue.acceptance_criteria.iter().enumerate() {
            let mark = if criterion.satisfied {
                color::success("[x]", config)
            } else {
                dimmed("[ ]", config)
            };
            writeln!(w, "  {mark} {}. {}", index + 1, criterion.text)?;
        }
    }

    if !issue.dev_notes.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}:", bold("Dev Notes", config))?;
        for line in wrap_text(&issue.dev_notes, content_width.saturating_sub(2)) {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}

fn title_of<'a>(backlog: &'a Backlog, id: &IssueId) -> &'a str {
    backlog.get(id).map_or("", |issue| issue.title.as_str())
}

fn print_next_text<W: Write>(
    w: &mut W,
    state: &BacklogState,
    backlog: &Backlog,
    config: &OutputConfig,
) -> io::Result<()> {
    match state {
        BacklogState::Complete => writeln!(w, "{}", success("All issues are Done.", config)),
        BacklogState::Eligible { id } => writeln!(
            w,
            "{} {}: {}",
            bold("Next:", config),
            colorize_id(id.as_str(), config),
            title_of(backlog, id)
        ),
        BacklogState::InFlight { id } => {
            let status = backlog.get(id).map_or(IssueStatus::InProgress, |i| i.status);
            writeln!(
                w,
                "{}: {} is {}; `devloop run` resumes it",
                colorize_id(id.as_str(), config),
                title_of(backlog, id),
                colorize_status(status, config)
            )
        }
        BacklogState::Promotable { ids } => writeln!(
            w,
            "No Ready issue. {} can be promoted with `devloop promote`.",
            join_ids(ids, config)
        ),
        BacklogState::Blocked(report) => print_blocked_text(w, report, config),
    }
}

fn print_blocked_text<W: Write>(w: &mut W, report: &BlockedReport, config: &OutputConfig) -> io::Result<()> {
    if report.is_empty() {
        writeln!(w, "No blocked issues.")?;
        return Ok(());
    }

    for cycle in &report.cycles {
        let arrow = format!(" {} ", cyan("->", config));
        let mut members: Vec<String> = cycle.iter().map(|id| colorize_id(id.as_str(), config)).collect();
        if let Some(first) = members.first().cloned() {
            members.push(first);
        }
        writeln!(w, "{} {}", error("Cycle:", config), members.join(&arrow))?;
    }

    if !report.waiting.is_empty() {
        if !report.cycles.is_empty() {
            writeln!(w)?;
        }
        writeln!(w, "{} ({}):", bold("Waiting", config), report.waiting.len())?;
        for waiting in &report.waiting {
            writeln!(
                w,
                "  {} {}: {}",
                colored_status_icon(waiting.status, config),
                colorize_id(waiting.id.as_str(), config),
                waiting.title
            )?;
            for unmet in &waiting.unmet {
                let status = match unmet.status {
                    Some(status) => colorize_status(status, config),
                    None => error("missing from backlog", config),
                };
                writeln!(
                    w,
                    "      {} {} ({status})",
                    cyan("->", config),
                    colorize_id(unmet.id.as_str(), config)
                )?;
            }
        }
    }
    Ok(())
}

fn print_transitions_text<W: Write>(
    w: &mut W,
    transitions: &[Transition],
    config: &OutputConfig,
) -> io::Result<()> {
    if transitions.is_empty() {
        writeln!(w, "Nothing to promote.")?;
        return Ok(());
    }
    for t in transitions {
        writeln!(
            w,
            "{} {}: {} {} {}",
            success("✓", config),
            colorize_id(t.id.as_str(), config),
            colorize_status(t.from, config),
            cyan("->", config),
            colorize_status(t.to, config)
        )?;
    }
    Ok(())
}

fn print_sync_plan_text<W: Write>(w: &mut W, actions: &[SyncAction], config: &OutputConfig) -> io::Result<()> {
    let mut unchanged = 0;
    for action in actions {
        match action {
            SyncAction::Create { id, title, status } => writeln!(
                w,
                "{} {}: {title} ({status})",
                success("create", config),
                colorize_id(id.as_str(), config)
            )?,
            SyncAction::Update {
                id,
                tracker_id,
                from,
                to,
            } => writeln!(
                w,
                "{} {} (#{tracker_id}): {from} {} {to}",
                warning("update", config),
                colorize_id(id.as_str(), config),
                cyan("->", config)
            )?,
            SyncAction::Unchanged { .. } => unchanged += 1,
        }
    }
    writeln!(w, "{}", dimmed(&format!("{unchanged} unchanged"), config))?;
    Ok(())
}

fn print_sync_report_text<W: Write>(w: &mut W, report: &SyncReport, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "Sync: {} created, {} updated, {} unchanged",
        report.created, report.updated, report.unchanged
    )?;
    for (id, message) in &report.failed {
        writeln!(
            w,
            "  {} {}: {message}",
            error("failed", config),
            colorize_id(id.as_str(), config)
        )?;
    }
    Ok(())
}

fn print_sync_status_text<W: Write>(
    w: &mut W,
    backlog: &Backlog,
    state: &SyncState,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{} {}", dimmed("State file:", config), state.path().display())?;
    for issue in backlog.issues() {
        let current = issue.status.normalized();
        match state.get(issue.id.as_str()) {
            Some(entry) if entry.last_status == current => writeln!(
                w,
                "  {} #{} {}",
                colorize_id(issue.id.as_str(), config),
                entry.tracker_id,
                success(current, config)
            )?,
            Some(entry) => writeln!(
                w,
                "  {} #{} {} ({} {})",
                colorize_id(issue.id.as_str(), config),
                entry.tracker_id,
                warning(&entry.last_status, config),
                dimmed("now", config),
                current
            )?,
            None => writeln!(
                w,
                "  {} {}",
                colorize_id(issue.id.as_str(), config),
                dimmed("not synced", config)
            )?,
        }
    }
    Ok(())
}

fn print_loop_outcome_text<W: Write>(
    w: &mut W,
    outcome: &LoopOutcome,
    config: &OutputConfig,
) -> io::Result<()> {
    match outcome {
        LoopOutcome::Complete => writeln!(w, "{}", success("All issues are Done.", config)),
        LoopOutcome::Paused => writeln!(w, "Paused after one issue; run again to continue."),
        LoopOutcome::Blocked(report) => {
            writeln!(w, "{}", warning("Stopped: nothing is eligible.", config))?;
            print_blocked_text(w, report, config)
        }
    }
}

/// Wrap text to fit within a given width, preserving existing line breaks.
/// Uses textwrap to handle edge cases like long words (URLs, file paths).
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, max_width)
                    .into_iter()
                    .map(std::borrow::Cow::into_owned)
                    .collect()
            }
        })
        .collect()
}
