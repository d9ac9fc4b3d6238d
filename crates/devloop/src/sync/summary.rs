//! Human-readable issue descriptions for tracker items.

/// Field lines that carry tooling metadata rather than content.
const METADATA_PREFIXES: &[&str] = &[
    "**Status:**",
    "**Dependencies:**",
    "**Complexity:**",
    "**Layers:**",
    "**Files likely touched:**",
    "**Dev notes:**",
];

const CRITERIA_HEADER: &str = "**Acceptance criteria:**";

/// Build a tracker description from a raw issue block.
///
/// Keeps the prose paragraphs and the acceptance criteria (rendered as
/// `✅`/`☐` lines under a `Criteria:` header). The heading and metadata fields
/// are dropped.
pub fn human_summary(block: &str) -> String {
    let mut description: Vec<&str> = Vec::new();
    let mut criteria: Vec<String> = Vec::new();
    let mut in_criteria = false;
    let mut in_notes = false;

    for line in block.lines() {
        let stripped = line.trim();

        if stripped.starts_with('#') && stripped.contains("ISSUE-") {
            continue;
        }
        if stripped.starts_with("**Dev notes:**") {
            in_notes = true;
            continue;
        }
        if in_notes {
            // Notes run until the next field line.
            if !stripped.starts_with("**") {
                continue;
            }
            in_notes = false;
        }
        if METADATA_PREFIXES.iter().any(|p| stripped.starts_with(p)) {
            continue;
        }
        if stripped.starts_with(CRITERIA_HEADER) {
            in_criteria = true;
            continue;
        }

        if in_criteria {
            if let Some(text) = stripped.strip_prefix("- [x] ").or_else(|| stripped.strip_prefix("- [X] ")) {
                criteria.push(format!("✅ {text}"));
            } else if let Some(text) = stripped.strip_prefix("- [ ] ") {
                criteria.push(format!("☐ {text}"));
            } else if stripped.starts_with("**") {
                in_criteria = false;
            } else if !stripped.is_empty() {
                criteria.push(stripped.to_string());
            }
        } else if !stripped.is_empty() && !stripped.starts_with("**") {
            description.push(stripped);
        }
    }

    let mut parts: Vec<String> = Vec::new();
    if !description.is_empty() {
        parts.push(description.join("\n"));
    }
    if !criteria.is_empty() {
        parts.push(format!("\nCriteria:\n{}", criteria.join("\n")));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_keeps_prose_and_criteria() {
        let block = "\
### ISSUE-3: Export CSV

**Complexity:** S
**Dependencies:** ISSUE-1
**Status:** Ready

Users can download their report as CSV.
Headers match the on-screen table.

**Acceptance criteria:**
- [x] Download button
- [ ] Quotes are escaped

**Dev notes:** Used the csv crate
Second line of notes";

        assert_eq!(
            human_summary(block),
            "Users can download their report as CSV.\nHeaders match the on-screen table.\n\
             \nCriteria:\n✅ Download button\n☐ Quotes are escaped"
        );
    }

    #[test]
    fn test_summary_of_bare_block_is_empty() {
        let block = "### ISSUE-1: Bare\n**Status:** Backlog";
        assert_eq!(human_summary(block), "");
    }

    #[test]
    fn test_summary_without_criteria() {
        let block = "### ISSUE-1: Prose\n**Status:** Ready\n\nJust prose.";
        assert_eq!(human_summary(block), "Just prose.");
    }
}
