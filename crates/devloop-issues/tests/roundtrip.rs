//! Round-trip and edit-locality tests over generated backlog documents.

use devloop_issues::{IssuesDocument, STATUS_LITERALS};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct GeneratedIssue {
    title: String,
    status: usize,
    dependencies: Vec<u64>,
    criteria: Vec<(bool, String)>,
    notes: Option<String>,
    extra_field: Option<String>,
}

fn title() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,8}( [a-z]{2,8}){0,3}"
}

fn prose() -> impl Strategy<Value = String> {
    "[a-z]{1,8}( [a-z]{1,8}){0,5}\\.?"
}

fn issue(ordinal: u64) -> impl Strategy<Value = GeneratedIssue> {
    (
        title(),
        0..STATUS_LITERALS.len(),
        proptest::collection::vec(1..=ordinal.max(1), 0..3),
        proptest::collection::vec((any::<bool>(), prose()), 0..4),
        proptest::option::of(prose()),
        proptest::option::of("(S|M|L)"),
    )
        .prop_map(
            move |(title, status, dependencies, criteria, notes, extra_field)| GeneratedIssue {
                title,
                status,
                dependencies: dependencies.into_iter().filter(|d| *d < ordinal).collect(),
                criteria,
                notes,
                extra_field,
            },
        )
}

/// Line ending and blank-line style used when rendering a generated document.
#[derive(Debug, Clone, Copy)]
struct Layout {
    crlf: bool,
    blank_after_heading: bool,
    trailing_newline: bool,
}

fn layout() -> impl Strategy<Value = Layout> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(crlf, blank_after_heading, trailing_newline)| Layout {
            crlf,
            blank_after_heading,
            trailing_newline,
        },
    )
}

fn document() -> impl Strategy<Value = (Vec<GeneratedIssue>, Layout)> {
    (1u64..6)
        .prop_flat_map(|count| {
            let issues: Vec<_> = (1..=count).map(issue).collect();
            (issues, layout())
        })
}

fn render(issues: &[GeneratedIssue], layout: Layout) -> String {
    let mut lines: Vec<String> = vec![
        "# Issues: Generated".to_string(),
        String::new(),
        "**Spec:** specs/generated.md".to_string(),
    ];

    for (index, issue) in issues.iter().enumerate() {
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(format!("### ISSUE-{}: {}", index + 1, issue.title));
        if layout.blank_after_heading {
            lines.push(String::new());
        }
        if let Some(size) = &issue.extra_field {
            lines.push(format!("**Complexity:** {size}"));
        }
        let dependencies = if issue.dependencies.is_empty() {
            "none".to_string()
        } else {
            issue
                .dependencies
                .iter()
                .map(|d| format!("ISSUE-{d}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        lines.push(format!("**Dependencies:** {dependencies}"));
        lines.push(format!("**Status:** {}", STATUS_LITERALS[issue.status]));
        if !issue.criteria.is_empty() {
            lines.push(String::new());
            lines.push("**Acceptance criteria:**".to_string());
            for (checked, text) in &issue.criteria {
                let mark = if *checked { 'x' } else { ' ' };
                lines.push(format!("- [{mark}] {text}"));
            }
        }
        if let Some(notes) = &issue.notes {
            lines.push(String::new());
            lines.push(format!("**Dev notes:** {notes}"));
        }
    }

    let newline = if layout.crlf { "\r\n" } else { "\n" };
    let mut text = lines.join(newline);
    if layout.trailing_newline {
        text.push_str(newline);
    }
    text
}

proptest! {
    #[test]
    fn prop_unedited_document_renders_identically((issues, layout) in document()) {
        let text = render(&issues, layout);
        let doc = IssuesDocument::parse(&text).unwrap();
        prop_assert_eq!(doc.render(), text);
        prop_assert_eq!(doc.records().len(), issues.len());
    }

    #[test]
    fn prop_parsed_fields_match_generated((issues, layout) in document()) {
        let text = render(&issues, layout);
        let doc = IssuesDocument::parse(&text).unwrap();

        for (record, issue) in doc.records().iter().zip(&issues) {
            prop_assert_eq!(&record.title, &issue.title);
            prop_assert_eq!(record.status.as_str(), STATUS_LITERALS[issue.status]);
            prop_assert_eq!(record.criteria.len(), issue.criteria.len());
            for (criterion, (checked, text)) in record.criteria.iter().zip(&issue.criteria) {
                prop_assert_eq!(criterion.checked, *checked);
                prop_assert_eq!(&criterion.text, text);
            }
            prop_assert_eq!(record.dev_notes.clone(), issue.notes.clone().unwrap_or_default());
        }
    }

    #[test]
    fn prop_status_edit_changes_one_line(
        (issues, layout) in document(),
        pick in any::<prop::sample::Index>(),
        status in 0..STATUS_LITERALS.len(),
    ) {
        let text = render(&issues, layout);
        let mut doc = IssuesDocument::parse(&text).unwrap();
        let target = pick.index(issues.len());
        let id = format!("ISSUE-{}", target + 1);
        doc.set_status(&id, STATUS_LITERALS[status]).unwrap();

        let rendered = doc.render();
        let before: Vec<&str> = text.split('\n').collect();
        let after: Vec<&str> = rendered.split('\n').collect();
        prop_assert_eq!(before.len(), after.len());

        let changed: Vec<usize> = (0..before.len()).filter(|i| before[*i] != after[*i]).collect();
        if status == issues[target].status {
            prop_assert!(changed.is_empty());
        } else {
            prop_assert_eq!(changed.len(), 1);
            prop_assert!(after[changed[0]].starts_with("**Status:** "));
        }

        let reparsed = IssuesDocument::parse(&rendered).unwrap();
        prop_assert_eq!(reparsed.record(&id).unwrap().status.as_str(), STATUS_LITERALS[status]);
    }

    #[test]
    fn prop_notes_edit_leaves_other_blocks_untouched(
        (issues, layout) in document(),
        pick in any::<prop::sample::Index>(),
        notes in prose(),
    ) {
        let text = render(&issues, layout);
        let mut doc = IssuesDocument::parse(&text).unwrap();
        let target = pick.index(issues.len());
        let id = format!("ISSUE-{}", target + 1);
        doc.set_dev_notes(&id, &notes).unwrap();

        let reparsed = IssuesDocument::parse(&doc.render()).unwrap();
        for (index, record) in reparsed.records().iter().enumerate() {
            let original = doc.record(&record.id).unwrap();
            prop_assert_eq!(&record.status, &original.status);
            if index == target {
                prop_assert_eq!(&record.dev_notes, &notes);
            } else {
                prop_assert_eq!(
                    reparsed.block_text(&record.id),
                    IssuesDocument::parse(&text).unwrap().block_text(&record.id)
                );
            }
        }
    }
}

#[test]
fn test_hand_written_document_with_prose_roundtrips() {
    let text = "\
# Issues: Checkout

> Spec: [checkout](specs/checkout.md)

Some introduction that mentions ISSUE-1 without being a heading.

---

## ISSUE-1: Cart totals

**Complexity:** M
**Dependencies:** none
**Status:** In Review

Free-form description with *emphasis*.

**Acceptance criteria:**
- [X] Totals include tax
- [ ] Discounts apply before tax

**Dev notes:** first line
second line

---

## ISSUE-2: Payment

- **Dependencies:** ISSUE-1 (totals)
- **Status:** Backlog
";
    let mut doc = IssuesDocument::parse(text).unwrap();
    assert_eq!(doc.render(), text);
    assert_eq!(doc.spec_ref(), "specs/checkout.md");

    let cart = doc.record("ISSUE-1").unwrap();
    assert_eq!(cart.dev_notes, "first line\nsecond line");
    assert_eq!(cart.metadata("complexity"), Some("M"));
    assert_eq!(cart.criteria.len(), 2);
    assert!(cart.criteria[0].checked);

    doc.set_status("ISSUE-2", "Ready").unwrap();
    assert_eq!(
        doc.render(),
        text.replace("- **Status:** Backlog", "- **Status:** Ready")
    );
}
