//! Property tests for the Eligibility Resolver driven through the engine.
//!
//! Over any acyclic dependency graph, repeatedly promoting and working the
//! `next` issue visits every issue exactly once, never before its
//! dependencies.

use devloop::domain::{IssueId, IssueStatus};
use devloop::resolver::{self, BacklogState};
use devloop::transition::TransitionEngine;
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashMap;

mod common;
use common::{backlog_doc, engine_over};

type Graph = Vec<(u64, Vec<u64>)>;

/// Issues `1..=n` in a shuffled topological order; each may depend on
/// anything earlier in that order.
fn dag() -> impl Strategy<Value = Graph> {
    (1u64..10)
        .prop_flat_map(|n| {
            let order = Just((1..=n).collect::<Vec<u64>>()).prop_shuffle();
            let picks = proptest::collection::vec(proptest::collection::vec(any::<Index>(), 0..3), n as usize);
            (order, picks)
        })
        .prop_map(|(order, picks)| {
            let mut issues: Graph = order
                .iter()
                .enumerate()
                .map(|(pos, &ordinal)| {
                    let mut deps: Vec<u64> = if pos == 0 {
                        Vec::new()
                    } else {
                        picks[pos].iter().map(|ix| order[ix.index(pos)]).collect()
                    };
                    deps.sort_unstable();
                    deps.dedup();
                    (ordinal, deps)
                })
                .collect();
            issues.sort_by_key(|(ordinal, _)| *ordinal);
            issues
        })
}

fn render(issues: &Graph) -> String {
    let deps: Vec<String> = issues
        .iter()
        .map(|(_, deps)| {
            if deps.is_empty() {
                "none".to_string()
            } else {
                deps.iter().map(|d| format!("ISSUE-{d}")).collect::<Vec<_>>().join(", ")
            }
        })
        .collect();
    let blocks: Vec<(u64, &str, &str)> = issues
        .iter()
        .zip(&deps)
        .map(|((ordinal, _), deps)| (*ordinal, deps.as_str(), "Backlog"))
        .collect();
    backlog_doc(&blocks)
}

/// Promote, take `next`, and approve it until nothing is eligible.
async fn drive(engine: &TransitionEngine, limit: usize) -> Vec<u64> {
    let mut visited = Vec::new();
    for _ in 0..=limit {
        engine.promote().await.unwrap();
        let backlog = engine.store().load().await.unwrap();
        let Some(id) = resolver::next(&backlog) else {
            break;
        };
        engine.apply(&id, IssueStatus::InProgress).await.unwrap();
        engine.apply(&id, IssueStatus::InReview).await.unwrap();
        engine.approve(&id, &[]).await.unwrap();
        visited.push(id.ordinal());
    }
    visited
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn promote_and_next_visit_every_issue_in_dependency_order(issues in dag()) {
        let (engine, _backend) = engine_over(&render(&issues));
        let visited = runtime().block_on(drive(&engine, issues.len()));

        let mut sorted = visited.clone();
        sorted.sort_unstable();
        let all: Vec<u64> = issues.iter().map(|(ordinal, _)| *ordinal).collect();
        prop_assert_eq!(sorted, all);

        let position: HashMap<u64, usize> = visited.iter().enumerate().map(|(i, o)| (*o, i)).collect();
        for (ordinal, deps) in &issues {
            for dep in deps {
                prop_assert!(position[dep] < position[ordinal], "ISSUE-{} ran before ISSUE-{}", ordinal, dep);
            }
        }

        let backlog = runtime().block_on(engine.store().load()).unwrap();
        prop_assert_eq!(resolver::assess(&backlog), BacklogState::Complete);
    }

    #[test]
    fn cycle_members_are_never_eligible(issues in dag()) {
        let n = issues.len() as u64;
        let mut issues = issues;
        issues.push((n + 1, vec![n + 2]));
        issues.push((n + 2, vec![n + 1]));

        let (engine, _backend) = engine_over(&render(&issues));
        let visited = runtime().block_on(drive(&engine, issues.len()));

        prop_assert_eq!(visited.len(), issues.len() - 2);
        prop_assert!(!visited.contains(&(n + 1)));
        prop_assert!(!visited.contains(&(n + 2)));

        let backlog = runtime().block_on(engine.store().load()).unwrap();
        match resolver::assess(&backlog) {
            BacklogState::Blocked(report) => {
                prop_assert_eq!(
                    report.cycles,
                    vec![vec![IssueId::from_ordinal(n + 1), IssueId::from_ordinal(n + 2)]]
                );
            }
            other => prop_assert!(false, "expected Blocked, got {:?}", other),
        }
    }
}
