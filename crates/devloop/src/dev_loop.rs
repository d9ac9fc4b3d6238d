//! The development loop.
//!
//! Each step reloads the backlog, promotes what it can, and then works on one
//! issue: an issue left In Review or In Progress by an earlier run first,
//! otherwise the next eligible one. Working an issue means
//! `Ready -> In Progress`, running the agent, `In Progress -> In Review`, and
//! holding at the Review Gate until the reviewer approves or skips.
//!
//! A step that fails with `Error::InvalidTransition` is abandoned and the
//! loop starts over from a fresh read; any other error ends the run.

use crate::agent::{Agent, AgentReport, AgentRequest};
use crate::domain::{IssueId, IssueStatus};
use crate::error::{Error, Result};
use crate::resolver::{self, BacklogState, BlockedReport};
use crate::review::{DecisionSource, ReviewGate, Verdict, review_summary};
use crate::transition::{Transition, TransitionEngine};
use crate::vcs::{CommitPolicy, NoVersionControl, VersionControl};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Default number of consecutive aborted steps before the loop gives up.
pub const DEFAULT_MAX_ABORTED_STEPS: usize = 5;

/// How a run behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevLoopOptions {
    /// Stop after one issue.
    pub once: bool,
    /// Consecutive aborted steps tolerated before `Error::Stalled`.
    pub max_aborted_steps: usize,
}

impl Default for DevLoopOptions {
    fn default() -> Self {
        Self {
            once: false,
            max_aborted_steps: DEFAULT_MAX_ABORTED_STEPS,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoopOutcome {
    /// Every issue is Done.
    Complete,
    /// Work remains but nothing is eligible.
    Blocked(BlockedReport),
    /// `once` was set and work remains.
    Paused,
}

/// How one issue left the Review Gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Approved and Done.
    Approved,
    /// Skipped back to Ready.
    Skipped,
}

enum Step {
    Finished(LoopOutcome),
    Worked(IssueId, ReviewOutcome),
    Idle,
}

/// Drives issues through the lifecycle one at a time.
pub struct DevLoop {
    engine: TransitionEngine,
    agent: Box<dyn Agent>,
    decisions: Box<dyn DecisionSource>,
    vcs: Box<dyn VersionControl>,
    policy: CommitPolicy,
    spec_root: PathBuf,
    bookkeeping: Vec<PathBuf>,
    satisfied: HashMap<IssueId, BTreeSet<usize>>,
    summaries: HashMap<IssueId, String>,
}

impl std::fmt::Debug for DevLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevLoop")
            .field("engine", &self.engine)
            .field("policy", &self.policy)
            .field("spec_root", &self.spec_root)
            .field("bookkeeping", &self.bookkeeping)
            .finish_non_exhaustive()
    }
}

impl DevLoop {
    /// A loop without version control.
    pub fn new(
        engine: TransitionEngine,
        agent: Box<dyn Agent>,
        decisions: Box<dyn DecisionSource>,
    ) -> Self {
        Self {
            engine,
            agent,
            decisions,
            vcs: Box::new(NoVersionControl),
            policy: CommitPolicy::default(),
            spec_root: PathBuf::from("."),
            bookkeeping: Vec::new(),
            satisfied: HashMap::new(),
            summaries: HashMap::new(),
        }
    }

    /// Use `vcs` for commits, diffs and discards.
    #[must_use]
    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    /// Set the commit policy.
    #[must_use]
    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory the `Spec:` reference is resolved against.
    #[must_use]
    pub fn with_spec_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.spec_root = root.into();
        self
    }

    /// Paths owned by devloop itself (the issues file, `.devloop/`).
    ///
    /// Transition commits stage only these, and skipping an issue never
    /// discards them.
    #[must_use]
    pub fn with_bookkeeping_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.bookkeeping = paths;
        self
    }

    /// The transition engine.
    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    /// Run until the backlog is complete or blocked (or one issue is done
    /// with `once`).
    ///
    /// # Errors
    ///
    /// - `Error::Interrupted` if review input closes; the document keeps its
    ///   last saved state
    /// - `Error::Stalled` after too many consecutive aborted steps
    /// - any store, agent or version-control error
    pub async fn run(&mut self, options: DevLoopOptions) -> Result<LoopOutcome> {
        let mut aborted = 0;
        loop {
            match self.step().await {
                Ok(Step::Finished(outcome)) => return Ok(outcome),
                Ok(Step::Worked(id, outcome)) => {
                    aborted = 0;
                    tracing::info!(issue = %id, ?outcome, "Issue finished");
                    if options.once {
                        let backlog = self.engine.store().load().await?;
                        return Ok(if backlog.is_complete() {
                            LoopOutcome::Complete
                        } else {
                            LoopOutcome::Paused
                        });
                    }
                }
                Ok(Step::Idle) => {
                    aborted += 1;
                    if aborted >= options.max_aborted_steps {
                        return Err(Error::Stalled { aborted });
                    }
                }
                Err(e @ Error::InvalidTransition { .. }) => {
                    aborted += 1;
                    tracing::warn!(error = %e, aborted, "Step aborted");
                    if aborted >= options.max_aborted_steps {
                        return Err(Error::Stalled { aborted });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn step(&mut self) -> Result<Step> {
        let promoted = self.engine.promote().await?;
        if !promoted.is_empty() {
            let ids: Vec<String> = promoted.iter().map(|t| t.id.to_string()).collect();
            self.commit_bookkeeping(&format!("devloop: promote {}", ids.join(", ")))?;
        }

        let backlog = self.engine.store().load().await?;
        match resolver::assess(&backlog) {
            BacklogState::Complete => {
                tracing::info!("All issues are Done");
                Ok(Step::Finished(LoopOutcome::Complete))
            }
            BacklogState::Blocked(report) => {
                tracing::warn!(
                    waiting = report.waiting.len(),
                    cycles = report.cycles.len(),
                    "Backlog is blocked"
                );
                Ok(Step::Finished(LoopOutcome::Blocked(report)))
            }
            // Promotion just ran; another writer got in between.
            BacklogState::Promotable { .. } => Ok(Step::Idle),
            BacklogState::InFlight { id } => {
                let status = backlog.get(&id).map(|issue| issue.status);
                tracing::info!(issue = %id, ?status, "Resuming issue left by an earlier run");
                if status == Some(IssueStatus::InProgress) {
                    self.implement(&id, None).await?;
                    self.transition(&id, IssueStatus::InReview).await?;
                }
                let outcome = self.review_issue(&id).await?;
                Ok(Step::Worked(id, outcome))
            }
            BacklogState::Eligible { id } => {
                let outcome = self.work_issue(&id).await?;
                Ok(Step::Worked(id, outcome))
            }
        }
    }

    /// Take a Ready issue through implementation and review.
    pub async fn work_issue(&mut self, id: &IssueId) -> Result<ReviewOutcome> {
        self.transition(id, IssueStatus::InProgress).await?;
        self.implement(id, None).await?;
        self.transition(id, IssueStatus::InReview).await?;
        self.review_issue(id).await
    }

    async fn transition(&self, id: &IssueId, to: IssueStatus) -> Result<Transition> {
        let applied = self.engine.apply(id, to).await?;
        self.commit_transition(&applied)?;
        Ok(applied)
    }

    fn commit_transition(&self, applied: &Transition) -> Result<()> {
        if self.policy.commits_transitions() {
            self.vcs.commit(
                &format!("devloop: {} {} -> {}", applied.id, applied.from, applied.to),
                &self.bookkeeping,
            )?;
        }
        Ok(())
    }

    fn commit_bookkeeping(&self, message: &str) -> Result<()> {
        if self.policy.commits_transitions() {
            self.vcs.commit(message, &self.bookkeeping)?;
        }
        Ok(())
    }

    async fn implement(&mut self, id: &IssueId, feedback: Option<String>) -> Result<AgentReport> {
        let detail = self.engine.store().issue_detail(id).await?;
        let spec_path = self.spec_root.join(&detail.spec_ref);
        let spec_text = match tokio::fs::read_to_string(&spec_path).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %spec_path.display(), error = %e, "Parent spec not readable");
                None
            }
        };

        let request = AgentRequest {
            issue_id: id.clone(),
            title: detail.title,
            detail: detail.block,
            spec_ref: detail.spec_ref,
            spec_text,
            feedback,
        };
        let report = self.agent.implement(&request).await?;

        self.satisfied
            .entry(id.clone())
            .or_default()
            .extend(report.satisfied_criteria.iter().copied());
        self.summaries.insert(id.clone(), report.summary.clone());

        if let Some(notes) = &report.dev_notes
            && let Err(e) = self.engine.store().update_dev_notes(id, notes).await
        {
            match e {
                Error::Storage(_) => tracing::warn!(issue = %id, error = %e, "Agent dev notes not recorded"),
                other => return Err(other),
            }
        }
        Ok(report)
    }

    /// Hold an In Review issue at the Review Gate until it is approved or
    /// skipped. Each rejection records the feedback and reruns the agent.
    pub async fn review_issue(&mut self, id: &IssueId) -> Result<ReviewOutcome> {
        loop {
            let backlog = self.engine.store().load().await?;
            let issue = backlog
                .get(id)
                .cloned()
                .ok_or_else(|| Error::IssueNotFound(id.clone()))?;
            let satisfied: Vec<usize> = self
                .satisfied
                .get(id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            let summary = self.summaries.get(id).cloned().unwrap_or_default();

            let verdict = {
                let mut gate = ReviewGate::new(self.decisions.as_mut(), self.vcs.as_ref());
                gate.present(&review_summary(&issue, &satisfied, &summary));
                gate.decide().await?
            };

            match verdict {
                Verdict::Approve => {
                    self.engine.approve(id, &satisfied).await?;
                    // The approval commit carries the agent's work with it.
                    if self.policy.commits_approvals() {
                        self.vcs
                            .commit(&format!("devloop: complete {}: {}", id, issue.title), &[])?;
                    }
                    self.forget(id);
                    return Ok(ReviewOutcome::Approved);
                }
                Verdict::Reject(feedback) => match self.engine.reject(id, &feedback).await {
                    Ok(applied) => {
                        self.commit_transition(&applied)?;
                        self.implement(id, Some(feedback)).await?;
                    }
                    Err(Error::Storage(reason)) => {
                        self.decisions
                            .present(&format!("Feedback not recorded: {reason}"));
                    }
                    Err(e) => return Err(e),
                },
                Verdict::Skip => {
                    self.vcs.discard_changes(&self.bookkeeping)?;
                    let applied = self.engine.skip(id).await?;
                    self.commit_transition(&applied)?;
                    self.forget(id);
                    return Ok(ReviewOutcome::Skipped);
                }
            }
        }
    }

    fn forget(&mut self, id: &IssueId) {
        self.satisfied.remove(id);
        self.summaries.remove(id);
    }
}
