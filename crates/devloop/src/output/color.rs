//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Done:        green   (approved work, created tracker items)
//!   - In Progress: yellow  (agent running, warnings)
//!   - In Review:   magenta (waiting for a human)
//!   - Ready:       blue    (can be picked up)
//!   - Blocked:     red     (cycles, unmet dependencies, failures)
//!   - Reference:   cyan    (issue IDs, arrows)
//!   - Muted:       dimmed  (field labels, Backlog status)
//!   - Emphasis:    bold    (section headers)

use crate::domain::IssueStatus;
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

fn paint(text: &str, status: IssueStatus) -> String {
    match status {
        IssueStatus::Backlog => text.dimmed().to_string(),
        IssueStatus::Ready => text.blue().to_string(),
        IssueStatus::InProgress => text.yellow().to_string(),
        IssueStatus::InReview => text.magenta().to_string(),
        IssueStatus::Done => text.green().to_string(),
    }
}

/// Status literal, colored by status.
pub(crate) fn colorize_status(status: IssueStatus, config: &OutputConfig) -> String {
    let text = status.literal();
    if !config.use_colors {
        return text.to_string();
    }
    paint(text, status)
}

/// Colorize an issue ID (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Status icon, with ASCII fallback.
pub(crate) fn status_icon(status: IssueStatus, config: &OutputConfig) -> &'static str {
    if config.use_ascii {
        match status {
            IssueStatus::Backlog => "o",
            IssueStatus::Ready => "*",
            IssueStatus::InProgress => ">",
            IssueStatus::InReview => "?",
            IssueStatus::Done => "+",
        }
    } else {
        match status {
            IssueStatus::Backlog => "○",
            IssueStatus::Ready => "◇",
            IssueStatus::InProgress => "▶",
            IssueStatus::InReview => "●",
            IssueStatus::Done => "✓",
        }
    }
}

/// Get a colored status icon, with ASCII fallback support.
pub(crate) fn colored_status_icon(status: IssueStatus, config: &OutputConfig) -> String {
    let icon = status_icon(status, config);
    if !config.use_colors {
        return icon.to_string();
    }
    paint(icon, status)
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Apply cyan color to text (for arrows/connectors).
pub(crate) fn cyan(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}
