//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time.

use crate::domain::IssueId;

/// Longest dev note accepted on the command line.
pub const MAX_NOTE_LENGTH: usize = 10_000;

/// Validate an `ISSUE-<n>` identifier.
pub fn validate_issue_id(s: &str) -> Result<IssueId, String> {
    IssueId::parse(s).ok_or_else(|| {
        format!("Invalid issue ID: '{}'. Expected format: ISSUE-<number> (e.g., ISSUE-3)", s.trim())
    })
}

/// Validate the issues file path.
///
/// Delegates to `commands::init` so the rules live in one place.
pub fn validate_issues_file(s: &str) -> Result<String, String> {
    use crate::commands::init;

    let trimmed = s.trim();
    init::validate_issues_file(trimmed).map_err(|e| e.to_string())?;
    Ok(trimmed.to_string())
}

/// Validate a dev note.
pub fn validate_note(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Note cannot be empty".to_string());
    }
    if trimmed.len() > MAX_NOTE_LENGTH {
        return Err(format!("Note cannot exceed {MAX_NOTE_LENGTH} characters"));
    }
    Ok(trimmed.to_string())
}
