//! Sync Bridge: best-effort mirror of the backlog to an external tracker.
//!
//! After every transition the bridge compares each issue's normalized status
//! with the status it last pushed (kept in [`SyncState`]) and creates or
//! updates tracker items accordingly. [`SyncBridge::mirror`] never returns an
//! error: tracker failures are logged as sync failures and skipped, and the
//! state file only records items the tracker accepted, so the next mirror
//! retries them.
//!
//! Tracker-specific adapters implement [`TrackerAdapter`].

mod state;
mod summary;

pub use state::{SyncEntry, SyncState};
pub use summary::human_summary;

use crate::domain::{Backlog, Issue, IssueId, IssueStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// What a tracker item is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerItem {
    /// Issue identifier.
    pub id: IssueId,
    /// Item title (`ISSUE-3: Export CSV`).
    pub title: String,
    /// Current status.
    pub status: IssueStatus,
    /// Prose and criteria, see [`human_summary`].
    pub description: String,
    /// `**Complexity:**` field, if present.
    pub complexity: Option<String>,
    /// `**Layers:**` field, if present.
    pub layers: Option<String>,
}

impl TrackerItem {
    fn from_issue(issue: &Issue, backlog: &Backlog) -> Self {
        Self {
            id: issue.id.clone(),
            title: format!("{}: {}", issue.id, issue.title),
            status: issue.status,
            description: backlog
                .block_text(&issue.id)
                .map(|block| human_summary(&block))
                .unwrap_or_default(),
            complexity: issue.metadata("complexity").map(str::to_string),
            layers: issue.metadata("layers").map(str::to_string),
        }
    }
}

/// An external tracker the backlog is mirrored to.
///
/// Failures should be reported as [`Error::Sync`].
#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    /// Tracker name, for logs.
    fn name(&self) -> &str;

    /// Create an item and return the tracker's id for it.
    async fn create_item(&self, item: &TrackerItem) -> Result<String>;

    /// Move an existing item to a status. Adapters map
    /// [`IssueStatus::normalized`] keys onto their own columns.
    async fn update_status(&self, external_id: &str, status: IssueStatus) -> Result<()>;
}

/// One step of a sync, as previewed by [`SyncBridge::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// The issue has no tracker item yet.
    Create {
        /// Issue identifier.
        id: IssueId,
        /// Issue title.
        title: String,
        /// Normalized status the item will get.
        status: String,
    },
    /// The tracker item's status is stale.
    Update {
        /// Issue identifier.
        id: IssueId,
        /// Tracker item id.
        tracker_id: String,
        /// Status last pushed.
        from: String,
        /// Status to push.
        to: String,
    },
    /// Nothing to do.
    Unchanged {
        /// Issue identifier.
        id: IssueId,
    },
}

/// Outcome of a mirror pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Items created.
    pub created: usize,
    /// Items updated.
    pub updated: usize,
    /// Items already current.
    pub unchanged: usize,
    /// Issues whose sync failed, with the failure message.
    pub failed: Vec<(IssueId, String)>,
}

enum Target {
    /// No tracker configured.
    Disabled,
    /// A tracker is configured but cannot be used.
    Unavailable(String),
    Adapter(Box<dyn TrackerAdapter>),
}

/// Mirrors backlog state to a tracker without ever failing the caller.
pub struct SyncBridge {
    target: Target,
    state_path: PathBuf,
    key: String,
}

impl std::fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &self.target {
            Target::Disabled => "disabled".to_string(),
            Target::Unavailable(reason) => format!("unavailable ({reason})"),
            Target::Adapter(adapter) => adapter.name().to_string(),
        };
        f.debug_struct("SyncBridge")
            .field("target", &target)
            .field("state_path", &self.state_path)
            .field("key", &self.key)
            .finish()
    }
}

impl SyncBridge {
    /// A bridge that mirrors nothing.
    pub fn disabled() -> Self {
        Self {
            target: Target::Disabled,
            state_path: PathBuf::new(),
            key: String::new(),
        }
    }

    /// A bridge over an adapter.
    ///
    /// `key` identifies the issues document inside the shared state file.
    pub fn new(
        adapter: Box<dyn TrackerAdapter>,
        state_path: impl Into<PathBuf>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            target: Target::Adapter(adapter),
            state_path: state_path.into(),
            key: key.into(),
        }
    }

    /// A bridge for a tracker that is configured but cannot be used.
    ///
    /// Every mirror logs a sync failure with `reason`.
    pub fn unavailable(
        reason: impl Into<String>,
        state_path: impl Into<PathBuf>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            target: Target::Unavailable(reason.into()),
            state_path: state_path.into(),
            key: key.into(),
        }
    }

    /// Whether a tracker is configured at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.target, Target::Disabled)
    }

    /// Load the sync state for this bridge's document.
    pub async fn state(&self) -> Result<SyncState> {
        SyncState::load(&self.state_path, &self.key).await
    }

    /// Preview what [`Self::mirror`] would do.
    pub async fn plan(&self, backlog: &Backlog) -> Result<Vec<SyncAction>> {
        let state = self.state().await?;
        let actions = backlog
            .issues()
            .iter()
            .map(|issue| {
                let status = issue.status.normalized();
                match state.get(issue.id.as_str()) {
                    None => SyncAction::Create {
                        id: issue.id.clone(),
                        title: issue.title.clone(),
                        status: status.to_string(),
                    },
                    Some(entry) if entry.last_status != status => SyncAction::Update {
                        id: issue.id.clone(),
                        tracker_id: entry.tracker_id.clone(),
                        from: entry.last_status.clone(),
                        to: status.to_string(),
                    },
                    Some(_) => SyncAction::Unchanged {
                        id: issue.id.clone(),
                    },
                }
            })
            .collect();
        Ok(actions)
    }

    /// Push the backlog's statuses to the tracker.
    ///
    /// Never fails; problems are logged and listed in the report.
    pub async fn mirror(&self, backlog: &Backlog) -> SyncReport {
        let adapter = match &self.target {
            Target::Disabled => return SyncReport::default(),
            Target::Unavailable(reason) => {
                let err = Error::Sync(reason.clone());
                tracing::warn!(error = %err, "Tracker mirror skipped");
                return SyncReport::default();
            }
            Target::Adapter(adapter) => adapter.as_ref(),
        };

        let mut state = match self.state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Tracker mirror skipped: sync state unreadable");
                return SyncReport::default();
            }
        };

        let mut report = SyncReport::default();
        for issue in backlog.issues() {
            let status = issue.status.normalized();
            let result = match state.get(issue.id.as_str()).cloned() {
                None => {
                    let item = TrackerItem::from_issue(issue, backlog);
                    adapter.create_item(&item).await.map(|tracker_id| {
                        tracing::info!(issue = %issue.id, tracker = adapter.name(), %tracker_id, "Tracker item created");
                        state.insert(
                            issue.id.as_str(),
                            SyncEntry {
                                tracker_id,
                                last_status: status.to_string(),
                            },
                        );
                        report.created += 1;
                    })
                }
                Some(entry) if entry.last_status != status => adapter
                    .update_status(&entry.tracker_id, issue.status)
                    .await
                    .map(|()| {
                        tracing::info!(issue = %issue.id, tracker = adapter.name(), status, "Tracker item updated");
                        state.insert(
                            issue.id.as_str(),
                            SyncEntry {
                                tracker_id: entry.tracker_id,
                                last_status: status.to_string(),
                            },
                        );
                        report.updated += 1;
                    }),
                Some(_) => {
                    report.unchanged += 1;
                    Ok(())
                }
            };

            if let Err(e) = result {
                tracing::warn!(issue = %issue.id, tracker = adapter.name(), error = %e, "Sync failure");
                report.failed.push((issue.id.clone(), e.to_string()));
            }
        }

        if report.created + report.updated > 0
            && let Err(e) = state.save().await
        {
            tracing::warn!(error = %e, "Failed to save sync state");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DOC: &str = "\
Spec: s.md

---

### ISSUE-1: First
**Complexity:** S
**Dependencies:** none
**Status:** Done

Build the first thing.

---

### ISSUE-2: Second
**Dependencies:** ISSUE-1
**Status:** Ready
";

    #[derive(Default)]
    struct RecordingTracker {
        calls: Mutex<Vec<String>>,
        fail_creates_for: Option<String>,
    }

    #[async_trait]
    impl TrackerAdapter for RecordingTracker {
        fn name(&self) -> &str {
            "recording"
        }

        async fn create_item(&self, item: &TrackerItem) -> Result<String> {
            if self.fail_creates_for.as_deref() == Some(item.id.as_str()) {
                return Err(Error::Sync("board is read-only".to_string()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("create {} {}", item.title, item.status.normalized()));
            Ok(format!("T{}", item.id.ordinal()))
        }

        async fn update_status(&self, external_id: &str, status: IssueStatus) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {external_id} {}", status.normalized()));
            Ok(())
        }
    }

    fn bridge(dir: &TempDir, tracker: RecordingTracker) -> SyncBridge {
        SyncBridge::new(
            Box::new(tracker),
            dir.path().join("sync-state.json"),
            "feature.issues.md",
        )
    }

    #[tokio::test]
    async fn test_mirror_creates_then_updates() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge(&dir, RecordingTracker::default());

        let backlog = Backlog::parse(DOC).unwrap();
        let report = bridge.mirror(&backlog).await;
        assert_eq!(report.created, 2);

        let moved = Backlog::parse(&DOC.replace("**Status:** Ready", "**Status:** In Progress")).unwrap();
        let report = bridge.mirror(&moved).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);

        let state = bridge.state().await.unwrap();
        assert_eq!(state.get("ISSUE-2").unwrap().last_status, "in_progress");
        assert_eq!(state.get("ISSUE-2").unwrap().tracker_id, "T2");
    }

    #[tokio::test]
    async fn test_mirror_failure_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let tracker = RecordingTracker {
            fail_creates_for: Some("ISSUE-1".to_string()),
            ..RecordingTracker::default()
        };
        let bridge = bridge(&dir, tracker);

        let report = bridge.mirror(&Backlog::parse(DOC).unwrap()).await;
        assert_eq!(report.created, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, IssueId::from_ordinal(1));

        // The failed item is retried on the next plan.
        let plan = bridge.plan(&Backlog::parse(DOC).unwrap()).await.unwrap();
        assert!(matches!(&plan[0], SyncAction::Create { id, .. } if id.ordinal() == 1));
        assert!(matches!(&plan[1], SyncAction::Unchanged { .. }));
    }

    #[tokio::test]
    async fn test_plan_does_not_touch_state() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge(&dir, RecordingTracker::default());

        let plan = bridge.plan(&Backlog::parse(DOC).unwrap()).await.unwrap();
        assert_eq!(plan.len(), 2);
        assert!(!dir.path().join("sync-state.json").exists());
    }

    #[tokio::test]
    async fn test_unavailable_and_disabled_bridges_do_nothing() {
        let dir = TempDir::new().unwrap();
        let backlog = Backlog::parse(DOC).unwrap();

        let disabled = SyncBridge::disabled();
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.mirror(&backlog).await, SyncReport::default());

        let unavailable = SyncBridge::unavailable(
            "tracker 'monday' is not bundled",
            dir.path().join("sync-state.json"),
            "feature.issues.md",
        );
        assert!(unavailable.is_enabled());
        assert_eq!(unavailable.mirror(&backlog).await, SyncReport::default());
    }

    #[test]
    fn test_tracker_item_from_issue() {
        let backlog = Backlog::parse(DOC).unwrap();
        let issue = &backlog.issues()[0];
        let item = TrackerItem::from_issue(issue, &backlog);
        assert_eq!(item.title, "ISSUE-1: First");
        assert_eq!(item.complexity.as_deref(), Some("S"));
        assert_eq!(item.description, "Build the first thing.");
    }
}
