//! Eligibility Resolver: which issue may be worked on next.
//!
//! An issue is *eligible* when its status is Ready and every dependency
//! resolves to a Done issue. Among eligible issues the lowest ordinal wins,
//! so [`next`] is a pure function of the backlog.
//!
//! A dependency that names an issue missing from the backlog is never
//! satisfied; it shows up in the [`BlockedReport`] with no status.

mod graph;

use crate::domain::{Backlog, Issue, IssueId, IssueStatus};
use crate::error::{Error, Result};
use serde::Serialize;

/// A dependency that is not Done yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetDependency {
    /// The dependency.
    pub id: IssueId,
    /// Its status, or `None` when the backlog has no such issue.
    pub status: Option<IssueStatus>,
}

/// A non-Done issue held back by dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitingIssue {
    /// The waiting issue.
    pub id: IssueId,
    /// Its title.
    pub title: String,
    /// Its status.
    pub status: IssueStatus,
    /// Dependencies that are not Done.
    pub unmet: Vec<UnmetDependency>,
}

/// Why no issue is eligible even though work remains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockedReport {
    /// Waiting issues in ordinal order.
    pub waiting: Vec<WaitingIssue>,
    /// Dependency cycles; their members can never become eligible.
    pub cycles: Vec<Vec<IssueId>>,
}

impl BlockedReport {
    /// Whether the report lists nothing.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.cycles.is_empty()
    }
}

/// Overall state of a backlog from the loop's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BacklogState {
    /// Every issue is Done.
    Complete,
    /// An issue was left In Review or In Progress and must be finished first.
    InFlight {
        /// The issue to resume.
        id: IssueId,
    },
    /// An issue can be picked up.
    Eligible {
        /// The issue [`next`] returns.
        id: IssueId,
    },
    /// Backlog issues can be promoted to Ready.
    Promotable {
        /// Issues [`promotable`] returns.
        ids: Vec<IssueId>,
    },
    /// Work remains but nothing can move.
    Blocked(BlockedReport),
}

fn unmet_dependencies(backlog: &Backlog, issue: &Issue) -> Vec<UnmetDependency> {
    issue
        .dependencies
        .iter()
        .filter_map(|dependency| match backlog.get(dependency) {
            Some(dep) if dep.status == IssueStatus::Done => None,
            Some(dep) => Some(UnmetDependency {
                id: dependency.clone(),
                status: Some(dep.status),
            }),
            None => Some(UnmetDependency {
                id: dependency.clone(),
                status: None,
            }),
        })
        .collect()
}

fn dependencies_done(backlog: &Backlog, issue: &Issue) -> bool {
    issue.dependencies.iter().all(|dependency| {
        backlog
            .get(dependency)
            .is_some_and(|dep| dep.status == IssueStatus::Done)
    })
}

fn sorted_ids<'a>(issues: impl Iterator<Item = &'a Issue>) -> Vec<IssueId> {
    let mut ids: Vec<IssueId> = issues.map(|issue| issue.id.clone()).collect();
    ids.sort();
    ids
}

/// All eligible issues, lowest ordinal first.
pub fn eligible(backlog: &Backlog) -> Vec<IssueId> {
    sorted_ids(
        backlog
            .issues()
            .iter()
            .filter(|issue| issue.status == IssueStatus::Ready && dependencies_done(backlog, issue)),
    )
}

/// The next issue to work on, if any.
pub fn next(backlog: &Backlog) -> Option<IssueId> {
    eligible(backlog).into_iter().next()
}

/// Backlog issues whose dependencies are all Done, lowest ordinal first.
pub fn promotable(backlog: &Backlog) -> Vec<IssueId> {
    sorted_ids(
        backlog
            .issues()
            .iter()
            .filter(|issue| issue.status == IssueStatus::Backlog && dependencies_done(backlog, issue)),
    )
}

/// Every dependency cycle, each sorted by ordinal.
pub fn find_cycles(backlog: &Backlog) -> Vec<Vec<IssueId>> {
    graph::find_cycles(backlog)
}

/// Fail with [`Error::CycleDetected`] when the dependency graph has a cycle.
pub fn ensure_acyclic(backlog: &Backlog) -> Result<()> {
    let cycles = find_cycles(backlog);
    if cycles.is_empty() {
        Ok(())
    } else {
        Err(Error::CycleDetected(cycles))
    }
}

/// Non-Done issues with unmet dependencies, plus any cycles.
pub fn blocked_report(backlog: &Backlog) -> BlockedReport {
    let mut waiting: Vec<WaitingIssue> = backlog
        .remaining()
        .filter_map(|issue| {
            let unmet = unmet_dependencies(backlog, issue);
            (!unmet.is_empty()).then(|| WaitingIssue {
                id: issue.id.clone(),
                title: issue.title.clone(),
                status: issue.status,
                unmet,
            })
        })
        .collect();
    waiting.sort_by(|a, b| a.id.cmp(&b.id));

    BlockedReport {
        waiting,
        cycles: find_cycles(backlog),
    }
}

/// Classify the backlog.
///
/// In-flight issues come first (In Review before In Progress), then the
/// next eligible issue, then promotable ones.
pub fn assess(backlog: &Backlog) -> BacklogState {
    if backlog.is_complete() {
        return BacklogState::Complete;
    }

    for status in [IssueStatus::InReview, IssueStatus::InProgress] {
        let in_flight = sorted_ids(backlog.issues().iter().filter(|i| i.status == status));
        if let Some(id) = in_flight.into_iter().next() {
            return BacklogState::InFlight { id };
        }
    }

    if let Some(id) = next(backlog) {
        return BacklogState::Eligible { id };
    }

    let ids = promotable(backlog);
    if !ids.is_empty() {
        return BacklogState::Promotable { ids };
    }

    BacklogState::Blocked(blocked_report(backlog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn backlog(blocks: &[(u64, &str, &str)]) -> Backlog {
        let mut text = String::from("Spec: s.md\n");
        for (ordinal, deps, status) in blocks {
            text.push_str(&format!(
                "\n---\n\n### ISSUE-{ordinal}: Issue {ordinal}\n**Dependencies:** {deps}\n**Status:** {status}\n"
            ));
        }
        Backlog::parse(&text).unwrap()
    }

    fn id(ordinal: u64) -> IssueId {
        IssueId::from_ordinal(ordinal)
    }

    #[test]
    fn test_next_picks_lowest_ordinal() {
        let backlog = backlog(&[
            (7, "none", "Ready"),
            (3, "none", "Ready"),
            (5, "none", "Ready"),
        ]);
        assert_eq!(next(&backlog), Some(id(3)));
        assert_eq!(eligible(&backlog), vec![id(3), id(5), id(7)]);
    }

    #[test]
    fn test_next_requires_done_dependencies() {
        let backlog = backlog(&[
            (1, "none", "In Review"),
            (2, "ISSUE-1", "Ready"),
            (3, "none", "Ready"),
        ]);
        assert_eq!(next(&backlog), Some(id(3)));
    }

    #[rstest]
    #[case::backlog("Backlog")]
    #[case::in_progress("In Progress")]
    #[case::in_review("In Review")]
    #[case::done("Done")]
    fn test_only_ready_is_eligible(#[case] status: &str) {
        let backlog = backlog(&[(1, "none", status)]);
        assert_eq!(next(&backlog), None);
    }

    #[test]
    fn test_next_is_deterministic() {
        let backlog = backlog(&[
            (2, "ISSUE-1", "Ready"),
            (1, "none", "Done"),
            (4, "none", "Ready"),
        ]);
        let first = next(&backlog);
        for _ in 0..10 {
            assert_eq!(next(&backlog), first);
        }
        assert_eq!(first, Some(id(2)));
    }

    #[test]
    fn test_missing_dependency_blocks() {
        let backlog = backlog(&[(1, "ISSUE-9", "Ready")]);
        assert_eq!(next(&backlog), None);

        let report = blocked_report(&backlog);
        assert_eq!(report.waiting.len(), 1);
        assert_eq!(
            report.waiting[0].unmet,
            vec![UnmetDependency {
                id: id(9),
                status: None
            }]
        );
    }

    #[test]
    fn test_promotable_in_ordinal_order() {
        let backlog = backlog(&[
            (1, "none", "Done"),
            (4, "ISSUE-1", "Backlog"),
            (2, "none", "Backlog"),
            (3, "ISSUE-2", "Backlog"),
        ]);
        assert_eq!(promotable(&backlog), vec![id(2), id(4)]);
    }

    #[test]
    fn test_cycle_is_never_eligible_and_reported() {
        let backlog = backlog(&[(1, "ISSUE-2", "Ready"), (2, "ISSUE-1", "Ready")]);
        assert_eq!(next(&backlog), None);
        assert!(promotable(&backlog).is_empty());

        match assess(&backlog) {
            BacklogState::Blocked(report) => {
                assert_eq!(report.cycles, vec![vec![id(1), id(2)]]);
                assert_eq!(report.waiting.len(), 2);
            }
            other => panic!("Expected Blocked, got {other:?}"),
        }

        let err = ensure_acyclic(&backlog).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ISSUE-1") && message.contains("ISSUE-2"));
    }

    #[test]
    fn test_assess_complete() {
        let backlog = backlog(&[(1, "none", "Done"), (2, "ISSUE-1", "Done")]);
        assert_eq!(assess(&backlog), BacklogState::Complete);
    }

    #[test]
    fn test_assess_prefers_in_review_over_in_progress() {
        let backlog = backlog(&[
            (1, "none", "In Progress"),
            (2, "none", "In Review"),
            (3, "none", "Ready"),
        ]);
        assert_eq!(assess(&backlog), BacklogState::InFlight { id: id(2) });
    }

    #[test]
    fn test_assess_promotable() {
        let backlog = backlog(&[(1, "none", "Done"), (2, "ISSUE-1", "Backlog")]);
        assert_eq!(
            assess(&backlog),
            BacklogState::Promotable { ids: vec![id(2)] }
        );
    }

    #[test]
    fn test_blocked_report_lists_statuses_of_unmet() {
        let backlog = backlog(&[
            (1, "none", "In Review"),
            (2, "ISSUE-1", "Backlog"),
        ]);
        let report = blocked_report(&backlog);
        assert_eq!(report.waiting[0].id, id(2));
        assert_eq!(report.waiting[0].unmet[0].status, Some(IssueStatus::InReview));
        assert!(report.cycles.is_empty());
    }
}
