//! Dependency graph operations using petgraph.

use crate::domain::{Backlog, IssueId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Build the dependency graph: one node per issue, an edge from each issue to
/// every dependency that exists in the backlog.
fn build_graph(backlog: &Backlog) -> DiGraph<IssueId, ()> {
    let mut graph = DiGraph::new();
    let mut nodes: HashMap<&IssueId, NodeIndex> = HashMap::new();

    for issue in backlog.issues() {
        nodes.insert(&issue.id, graph.add_node(issue.id.clone()));
    }

    for issue in backlog.issues() {
        let from = nodes[&issue.id];
        for dependency in &issue.dependencies {
            if let Some(&to) = nodes.get(dependency) {
                graph.add_edge(from, to, ());
            }
        }
    }

    graph
}

/// Find every dependency cycle.
///
/// Each cycle is the set of issues in one strongly connected component,
/// sorted by ordinal; an issue that depends on itself is a cycle of one.
/// Cycles are returned ordered by their lowest member.
pub(super) fn find_cycles(backlog: &Backlog) -> Vec<Vec<IssueId>> {
    let graph = build_graph(backlog);

    let mut cycles: Vec<Vec<IssueId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut members: Vec<IssueId> =
                component.into_iter().map(|node| graph[node].clone()).collect();
            members.sort();
            members
        })
        .collect();

    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backlog(blocks: &[(u64, &str)]) -> Backlog {
        let mut text = String::from("Spec: s.md\n");
        for (ordinal, deps) in blocks {
            text.push_str(&format!(
                "\n---\n\n### ISSUE-{ordinal}: Issue {ordinal}\n**Dependencies:** {deps}\n**Status:** Ready\n"
            ));
        }
        Backlog::parse(&text).unwrap()
    }

    fn ids(ordinals: &[u64]) -> Vec<IssueId> {
        ordinals.iter().copied().map(IssueId::from_ordinal).collect()
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let backlog = backlog(&[(1, "none"), (2, "ISSUE-1"), (3, "ISSUE-1, ISSUE-2")]);
        assert!(find_cycles(&backlog).is_empty());
    }

    #[test]
    fn test_two_issue_cycle() {
        let backlog = backlog(&[(1, "ISSUE-2"), (2, "ISSUE-1"), (3, "none")]);
        assert_eq!(find_cycles(&backlog), vec![ids(&[1, 2])]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let backlog = backlog(&[(1, "none"), (4, "ISSUE-4")]);
        assert_eq!(find_cycles(&backlog), vec![ids(&[4])]);
    }

    #[test]
    fn test_multiple_cycles_sorted() {
        let backlog = backlog(&[
            (1, "none"),
            (5, "ISSUE-6"),
            (6, "ISSUE-5"),
            (2, "ISSUE-4"),
            (3, "ISSUE-2"),
            (4, "ISSUE-3"),
        ]);
        assert_eq!(find_cycles(&backlog), vec![ids(&[2, 3, 4]), ids(&[5, 6])]);
    }

    #[test]
    fn test_missing_dependency_is_not_a_cycle() {
        let backlog = backlog(&[(1, "ISSUE-9")]);
        assert!(find_cycles(&backlog).is_empty());
    }
}
