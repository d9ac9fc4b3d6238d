//! Status Transition Engine.
//!
//! The only path by which an issue's status changes. Every operation re-reads
//! the document, validates the requested edge against the status it finds
//! there, and writes through [`BacklogStore::modify`] so the document is either
//! fully updated or untouched. After a successful write the new backlog is
//! mirrored through the [`SyncBridge`].

use crate::domain::{Backlog, IssueId, IssueStatus};
use crate::error::{Error, Result};
use crate::resolver;
use crate::storage::BacklogStore;
use crate::sync::SyncBridge;
use serde::Serialize;
use std::fmt;

/// A status change that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Issue that moved.
    pub id: IssueId,
    /// Status before.
    pub from: IssueStatus,
    /// Status after.
    pub to: IssueStatus,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.id, self.from, self.to)
    }
}

/// Validate and apply one edge inside a `modify` closure.
fn transition(backlog: &mut Backlog, id: &IssueId, to: IssueStatus) -> Result<Transition> {
    let from = backlog.transition(id, to)?;
    Ok(Transition {
        id: id.clone(),
        from,
        to,
    })
}

/// Applies status changes and mirrors them.
#[derive(Debug)]
pub struct TransitionEngine {
    store: BacklogStore,
    sync: SyncBridge,
}

impl TransitionEngine {
    /// Create an engine over a store and a sync bridge.
    pub fn new(store: BacklogStore, sync: SyncBridge) -> Self {
        Self { store, sync }
    }

    /// The underlying store, for reads and dev-note edits.
    pub fn store(&self) -> &BacklogStore {
        &self.store
    }

    async fn commit<T, F>(&self, f: F) -> Result<(Backlog, T)>
    where
        F: FnOnce(&mut Backlog) -> Result<T> + Send,
        T: Send,
    {
        match self.store.modify(f).await {
            Ok((backlog, value)) => {
                self.sync.mirror(&backlog).await;
                Ok((backlog, value))
            }
            Err(e @ Error::InvalidTransition { .. }) => {
                tracing::warn!(error = %e, "Transition rejected");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Move an issue to `to`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTransition` if the persisted status has no edge to `to`
    /// - `Error::IssueNotFound` if the issue is not in the backlog
    pub async fn apply(&self, id: &IssueId, to: IssueStatus) -> Result<Transition> {
        let (backlog, from) = match self.store.update_status(id, to).await {
            Ok(updated) => updated,
            Err(e @ Error::InvalidTransition { .. }) => {
                tracing::warn!(error = %e, "Transition rejected");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.sync.mirror(&backlog).await;

        let applied = Transition {
            id: id.clone(),
            from,
            to,
        };
        tracing::info!(issue = %id, from = %applied.from, to = %applied.to, "Status changed");
        Ok(applied)
    }

    /// Promote every Backlog issue whose dependencies are all Done, in
    /// ordinal order. One write covers the whole batch.
    pub async fn promote(&self) -> Result<Vec<Transition>> {
        let (_, promoted) = self
            .commit(|backlog| {
                resolver::promotable(backlog)
                    .into_iter()
                    .map(|id| transition(backlog, &id, IssueStatus::Ready))
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        for t in &promoted {
            tracing::info!(issue = %t.id, "Promoted to Ready");
        }
        Ok(promoted)
    }

    /// Approve an issue under review: tick the reported criteria and mark it
    /// Done.
    ///
    /// `satisfied` holds zero-based criterion indices; indices past the end of
    /// the issue's criteria are logged and ignored.
    pub async fn approve(&self, id: &IssueId, satisfied: &[usize]) -> Result<Transition> {
        let (_, applied) = self
            .commit(|backlog| {
                let applied = transition(backlog, id, IssueStatus::Done)?;
                let count = backlog
                    .get(id)
                    .map_or(0, |issue| issue.acceptance_criteria.len());
                for &index in satisfied {
                    if index < count {
                        backlog.satisfy_criterion(id, index)?;
                    } else {
                        tracing::warn!(issue = %id, criterion = index + 1, "Agent reported a criterion the issue does not have");
                    }
                }
                Ok(applied)
            })
            .await?;

        tracing::info!(issue = %id, criteria = satisfied.len(), "Approved");
        Ok(applied)
    }

    /// Reject an issue under review. The feedback is appended to its dev
    /// notes and the issue stays In Review.
    ///
    /// # Errors
    ///
    /// - `Error::Storage` if the feedback is empty or would change the
    ///   document structure
    pub async fn reject(&self, id: &IssueId, feedback: &str) -> Result<Transition> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(Error::Storage("rejection feedback must not be empty".to_string()));
        }
        let note = format!(
            "Review feedback ({}): {feedback}",
            chrono::Local::now().format("%Y-%m-%d")
        );

        let (_, applied) = self
            .commit(|backlog| {
                let applied = transition(backlog, id, IssueStatus::InReview)?;
                backlog.append_dev_notes(id, &note)?;
                Ok(applied)
            })
            .await?;

        tracing::info!(issue = %id, "Rejected");
        Ok(applied)
    }

    /// Send an issue under review back to Ready.
    ///
    /// Discarding the work product is the caller's job.
    pub async fn skip(&self, id: &IssueId) -> Result<Transition> {
        let (_, applied) = self
            .commit(|backlog| {
                let from = backlog
                    .get(id)
                    .ok_or_else(|| Error::IssueNotFound(id.clone()))?
                    .status;
                // Backlog -> Ready is promotion, not a skip.
                if from != IssueStatus::InReview {
                    return Err(Error::InvalidTransition {
                        id: id.clone(),
                        from,
                        to: IssueStatus::Ready,
                    });
                }
                transition(backlog, id, IssueStatus::Ready)
            })
            .await?;

        tracing::info!(issue = %id, "Skipped");
        Ok(applied)
    }
}
