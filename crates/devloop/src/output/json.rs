//! JSON output shapes.

use crate::domain::{Backlog, Issue};
use crate::sync::SyncState;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};

pub(super) fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(w, "{json}")
}

pub(super) fn print_summary_json<W: Write>(w: &mut W, backlog: &Backlog) -> io::Result<()> {
    let counts: BTreeMap<&str, usize> = backlog
        .status_counts()
        .into_iter()
        .map(|(status, count)| (status.normalized(), count))
        .collect();
    write_json(
        w,
        &json!({
            "spec": backlog.spec_ref(),
            "issues": backlog.issues(),
            "counts": counts,
        }),
    )
}

pub(super) fn print_issue_json<W: Write>(w: &mut W, issue: &Issue, raw: Option<&str>) -> io::Result<()> {
    match raw {
        Some(block) => write_json(w, &json!({ "id": issue.id, "block": block })),
        None => write_json(w, issue),
    }
}

pub(super) fn print_sync_status_json<W: Write>(
    w: &mut W,
    backlog: &Backlog,
    state: &SyncState,
) -> io::Result<()> {
    let issues: Vec<_> = backlog
        .issues()
        .iter()
        .map(|issue| {
            let entry = state.get(issue.id.as_str());
            json!({
                "id": issue.id,
                "status": issue.status.normalized(),
                "tracker_id": entry.map(|e| e.tracker_id.as_str()),
                "last_status": entry.map(|e| e.last_status.as_str()),
            })
        })
        .collect();
    write_json(
        w,
        &json!({
            "state_file": state.path(),
            "issues": issues,
        }),
    )
}
