//! Domain types for the backlog.
//!
//! A [`Backlog`] is the typed view of one issues document. It keeps the parsed
//! [`IssuesDocument`] alongside the [`Issue`] values so that every change is
//! written into the document's own slots and nothing else moves.

use crate::error::{Error, Result};
use devloop_issues::{IssueRecord, IssuesDocument, ISSUE_ID_PREFIX};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identifier of an issue (`ISSUE-7`), ordered by its embedded ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueId {
    raw: String,
    ordinal: u64,
}

impl IssueId {
    /// Parse an `ISSUE-<n>` identifier.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.trim();
        devloop_issues::parse_issue_ref(raw).map(|ordinal| Self {
            raw: raw.to_string(),
            ordinal,
        })
    }

    /// Build the canonical identifier for an ordinal.
    pub fn from_ordinal(ordinal: u64) -> Self {
        Self {
            raw: format!("{ISSUE_ID_PREFIX}{ordinal}"),
            ordinal,
        }
    }

    /// The identifier as written in the document.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The number embedded in the identifier; lower ordinals are picked first.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }
}

impl Ord for IssueId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal
            .cmp(&other.ordinal)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for IssueId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for IssueId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidIssueId(s.to_string()))
    }
}

impl Serialize for IssueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for IssueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid issue id '{raw}'")))
    }
}

/// Lifecycle status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Written down, waiting on dependencies.
    Backlog,
    /// Dependencies done; may be picked up.
    Ready,
    /// The agent is working on it.
    InProgress,
    /// Waiting for a human decision.
    InReview,
    /// Approved.
    Done,
}

impl IssueStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::Ready,
        Self::InProgress,
        Self::InReview,
        Self::Done,
    ];

    /// The literal written on a `**Status:**` line.
    pub fn literal(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Ready => "Ready",
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Done => "Done",
        }
    }

    /// Tracker-neutral status key.
    pub fn normalized(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Done => "done",
        }
    }

    /// Whether `self -> to` is an edge of the transition graph.
    ///
    /// ```text
    /// Backlog     -> Ready
    /// Ready       -> In Progress
    /// In Progress -> In Review
    /// In Review   -> Done | In Review | Ready
    /// ```
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Backlog, Self::Ready)
                | (Self::Ready, Self::InProgress)
                | (Self::InProgress, Self::InReview)
                | (Self::InReview, Self::Done | Self::InReview | Self::Ready)
        )
    }

    /// Done is the only terminal status.
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    /// Accepts document literals and normalized keys, ignoring case
    /// (`In Progress`, `in_progress`, `in-progress`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        Self::ALL
            .into_iter()
            .find(|status| status.literal().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| Error::UnknownStatus(s.to_string()))
    }
}

/// One acceptance criterion of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptanceCriterion {
    /// Criterion text.
    pub text: String,
    /// Whether its checkbox is ticked.
    pub satisfied: bool,
}

/// An issue of the backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Unique identifier.
    pub id: IssueId,
    /// Heading title.
    pub title: String,
    /// Current status.
    pub status: IssueStatus,
    /// Issues that must be Done before this one may start.
    pub dependencies: Vec<IssueId>,
    /// Ordered acceptance criteria.
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    /// Free-form notes; empty when none were written.
    pub dev_notes: String,
    /// Other fields of the block (`Complexity`, `Layers`, ...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<(String, String)>,
}

impl Issue {
    fn from_record(record: &IssueRecord) -> Result<Self> {
        let id = IssueId::parse(&record.id).ok_or_else(|| Error::InvalidIssueId(record.id.clone()))?;
        let dependencies = record
            .dependencies
            .iter()
            .map(|d| d.parse())
            .collect::<Result<Vec<IssueId>>>()?;

        Ok(Self {
            id,
            title: record.title.clone(),
            status: record.status.parse()?,
            dependencies,
            acceptance_criteria: record
                .criteria
                .iter()
                .map(|c| AcceptanceCriterion {
                    text: c.text.clone(),
                    satisfied: c.checked,
                })
                .collect(),
            dev_notes: record.dev_notes.clone(),
            metadata: record.metadata.clone(),
        })
    }

    /// Look up a metadata field by name, ignoring ASCII case.
    pub fn metadata(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// All issues of one document, in document order.
#[derive(Debug, Clone)]
pub struct Backlog {
    issues: Vec<Issue>,
    document: IssuesDocument,
}

impl Backlog {
    /// Build a backlog from document text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the text violates the document grammar.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_document(IssuesDocument::parse(text)?)
    }

    pub(crate) fn from_document(document: IssuesDocument) -> Result<Self> {
        let issues = document
            .records()
            .iter()
            .map(Issue::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { issues, document })
    }

    /// Issues in document order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Find an issue by id.
    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.iter().find(|issue| &issue.id == id)
    }

    /// The parent spec document named on the `Spec:` line.
    pub fn spec_ref(&self) -> &str {
        self.document.spec_ref()
    }

    /// The raw text of an issue block.
    pub fn block_text(&self, id: &IssueId) -> Option<String> {
        self.document.block_text(id.as_str())
    }

    /// Issues whose status is not Done.
    pub fn remaining(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|issue| !issue.status.is_terminal())
    }

    /// Whether every issue is Done.
    pub fn is_complete(&self) -> bool {
        self.remaining().next().is_none()
    }

    /// Count issues per status, in lifecycle order.
    pub fn status_counts(&self) -> Vec<(IssueStatus, usize)> {
        IssueStatus::ALL
            .into_iter()
            .map(|status| {
                let count = self.issues.iter().filter(|i| i.status == status).count();
                (status, count)
            })
            .collect()
    }

    /// Render the backlog back to document text.
    pub fn render(&self) -> String {
        self.document.render()
    }

    fn position(&self, id: &IssueId) -> Result<usize> {
        self.issues
            .iter()
            .position(|issue| &issue.id == id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))
    }

    /// Move an issue along one edge of the transition graph, checked against
    /// the status held in this backlog. Returns the previous status.
    ///
    /// Every status change in the store and the transition engine goes
    /// through here.
    pub(crate) fn transition(&mut self, id: &IssueId, to: IssueStatus) -> Result<IssueStatus> {
        let from = self
            .get(id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?
            .status;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                id: id.clone(),
                from,
                to,
            });
        }
        self.set_status(id, to)?;
        Ok(from)
    }

    /// Write a status without checking the transition graph.
    pub(crate) fn set_status(&mut self, id: &IssueId, status: IssueStatus) -> Result<bool> {
        let index = self.position(id)?;
        let changed = self.document.set_status(id.as_str(), status.literal())?;
        self.issues[index].status = status;
        Ok(changed)
    }

    /// Tick an acceptance criterion (zero-based index).
    pub(crate) fn satisfy_criterion(&mut self, id: &IssueId, index: usize) -> Result<bool> {
        let position = self.position(id)?;
        let changed = self.document.set_criterion(id.as_str(), index, true)?;
        self.issues[position].acceptance_criteria[index].satisfied = true;
        Ok(changed)
    }

    /// Append a paragraph to an issue's dev notes.
    pub(crate) fn append_dev_notes(&mut self, id: &IssueId, text: &str) -> Result<bool> {
        let index = self.position(id)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let current = &self.issues[index].dev_notes;
        let notes = if current.is_empty() {
            text.to_string()
        } else {
            format!("{current}\n{text}")
        };
        let changed = self.document.set_dev_notes(id.as_str(), &notes)?;
        if let Some(record) = self.document.record(id.as_str()) {
            self.issues[index].dev_notes.clone_from(&record.dev_notes);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOC: &str = "\
Spec: specs/cart.md

---

### ISSUE-1: Cart model

**Dependencies:** none
**Status:** Done

- [x] Items have prices

---

### ISSUE-2: Cart totals

**Complexity:** M
**Dependencies:** ISSUE-1
**Status:** Ready

- [ ] Totals include tax
- [ ] Totals round to cents

**Dev notes:** _(filled by dev-loop during implementation)_
";

    #[rstest]
    #[case::document_literal("In Progress", IssueStatus::InProgress)]
    #[case::normalized("in_review", IssueStatus::InReview)]
    #[case::kebab("in-progress", IssueStatus::InProgress)]
    #[case::lowercase("done", IssueStatus::Done)]
    #[case::padded("  Ready ", IssueStatus::Ready)]
    fn test_status_from_str(#[case] input: &str, #[case] expected: IssueStatus) {
        assert_eq!(input.parse::<IssueStatus>().unwrap(), expected);
    }

    #[rstest]
    #[case::unknown("Blocked")]
    #[case::empty("")]
    fn test_status_from_str_rejects(#[case] input: &str) {
        assert!(matches!(
            input.parse::<IssueStatus>(),
            Err(Error::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_status_literals_match_document_grammar() {
        let literals: Vec<&str> = IssueStatus::ALL.iter().map(|s| s.literal()).collect();
        assert_eq!(literals, devloop_issues::STATUS_LITERALS);
    }

    #[test]
    fn test_exactly_six_edges_are_legal() {
        let legal: Vec<(IssueStatus, IssueStatus)> = IssueStatus::ALL
            .into_iter()
            .flat_map(|from| IssueStatus::ALL.into_iter().map(move |to| (from, to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();
        assert_eq!(
            legal,
            vec![
                (IssueStatus::Backlog, IssueStatus::Ready),
                (IssueStatus::Ready, IssueStatus::InProgress),
                (IssueStatus::InProgress, IssueStatus::InReview),
                (IssueStatus::InReview, IssueStatus::Ready),
                (IssueStatus::InReview, IssueStatus::InReview),
                (IssueStatus::InReview, IssueStatus::Done),
            ]
        );
    }

    #[test]
    fn test_issue_id_orders_by_ordinal() {
        let mut ids: Vec<IssueId> = ["ISSUE-10", "ISSUE-2", "ISSUE-1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(IssueId::as_str).collect();
        assert_eq!(ordered, ["ISSUE-1", "ISSUE-2", "ISSUE-10"]);
    }

    #[test]
    fn test_issue_id_serde_as_string() {
        let id = IssueId::from_ordinal(3);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ISSUE-3\"");
        let back: IssueId = serde_json::from_str("\"ISSUE-3\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<IssueId>("\"TASK-3\"").is_err());
    }

    #[test]
    fn test_backlog_from_document() {
        let backlog = Backlog::parse(DOC).unwrap();
        assert_eq!(backlog.spec_ref(), "specs/cart.md");
        assert_eq!(backlog.issues().len(), 2);

        let totals = backlog.get(&IssueId::from_ordinal(2)).unwrap();
        assert_eq!(totals.status, IssueStatus::Ready);
        assert_eq!(totals.dependencies, vec![IssueId::from_ordinal(1)]);
        assert_eq!(totals.acceptance_criteria.len(), 2);
        assert!(totals.dev_notes.is_empty());
        assert_eq!(totals.metadata("complexity"), Some("M"));
        assert!(!backlog.is_complete());
    }

    #[test]
    fn test_mutators_edit_document_in_place() {
        let mut backlog = Backlog::parse(DOC).unwrap();
        let id = IssueId::from_ordinal(2);

        assert!(backlog.set_status(&id, IssueStatus::InProgress).unwrap());
        assert!(backlog.satisfy_criterion(&id, 1).unwrap());
        assert!(backlog.append_dev_notes(&id, "Used banker's rounding").unwrap());
        assert!(backlog.append_dev_notes(&id, "Review feedback: round half up").unwrap());

        let expected = DOC
            .replacen("**Status:** Ready", "**Status:** In Progress", 1)
            .replacen("- [ ] Totals round", "- [x] Totals round", 1)
            .replacen(
                "_(filled by dev-loop during implementation)_",
                "Used banker's rounding\nReview feedback: round half up",
                1,
            );
        assert_eq!(backlog.render(), expected);

        let reloaded = Backlog::parse(&backlog.render()).unwrap();
        assert_eq!(reloaded.issues(), backlog.issues());
    }

    #[rstest]
    #[case::ready_to_in_progress(2, IssueStatus::InProgress, Ok(IssueStatus::Ready))]
    #[case::ready_to_done(2, IssueStatus::Done, Err(IssueStatus::Ready))]
    #[case::done_to_ready(1, IssueStatus::Ready, Err(IssueStatus::Done))]
    fn test_transition_checks_edge(
        #[case] ordinal: u64,
        #[case] to: IssueStatus,
        #[case] expected: std::result::Result<IssueStatus, IssueStatus>,
    ) {
        let mut backlog = Backlog::parse(DOC).unwrap();
        let id = IssueId::from_ordinal(ordinal);

        match (backlog.transition(&id, to), expected) {
            (Ok(from), Ok(want)) => {
                assert_eq!(from, want);
                assert_eq!(backlog.get(&id).unwrap().status, to);
            }
            (Err(Error::InvalidTransition { from, to: rejected, .. }), Err(want)) => {
                assert_eq!(from, want);
                assert_eq!(rejected, to);
                assert_eq!(backlog.render(), DOC);
            }
            (result, _) => panic!("unexpected result: {result:?}"),
        }
    }

    #[test]
    fn test_append_dev_notes_in_crlf_document() {
        let crlf = DOC.replace('\n', "\r\n");
        let mut backlog = Backlog::parse(&crlf).unwrap();
        let id = IssueId::from_ordinal(2);

        backlog.append_dev_notes(&id, "Used banker's rounding").unwrap();
        backlog.append_dev_notes(&id, "Review feedback:\r\nround half up").unwrap();

        let rendered = backlog.render();
        assert_eq!(rendered.matches('\n').count(), rendered.matches("\r\n").count());
        assert_eq!(
            backlog.get(&id).unwrap().dev_notes,
            "Used banker's rounding\nReview feedback:\nround half up"
        );
        let reloaded = Backlog::parse(&rendered).unwrap();
        assert_eq!(reloaded.issues(), backlog.issues());
    }

    #[test]
    fn test_mutators_unknown_issue() {
        let mut backlog = Backlog::parse(DOC).unwrap();
        let err = backlog
            .set_status(&IssueId::from_ordinal(9), IssueStatus::Ready)
            .unwrap_err();
        assert!(matches!(err, Error::IssueNotFound(_)));
    }

    #[test]
    fn test_status_counts() {
        let backlog = Backlog::parse(DOC).unwrap();
        let counts = backlog.status_counts();
        assert_eq!(counts[1], (IssueStatus::Ready, 1));
        assert_eq!(counts[4], (IssueStatus::Done, 1));
    }
}
