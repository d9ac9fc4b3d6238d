//! Persisted mapping from issues to tracker items.
//!
//! One JSON file holds the state for every issues document in a project,
//! keyed by the document path:
//!
//! ```json
//! {
//!   "specs/feature.issues.md": {
//!     "ISSUE-1": { "tracker_id": "1842", "last_status": "done" }
//!   }
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What the tracker knows about one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    /// Item id assigned by the tracker.
    pub tracker_id: String,
    /// Normalized status last pushed to the tracker.
    pub last_status: String,
}

type StateFile = BTreeMap<String, BTreeMap<String, SyncEntry>>;

/// Sync state for one issues document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    path: PathBuf,
    key: String,
    entries: BTreeMap<String, SyncEntry>,
}

impl SyncState {
    /// Load the entries stored under `key`; a missing file is empty state.
    pub async fn load(path: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let key = key.into();
        let mut all = read_state_file(&path).await?;
        let entries = all.remove(&key).unwrap_or_default();
        Ok(Self { path, key, entries })
    }

    /// Write the entries back, leaving other documents' entries untouched.
    pub async fn save(&self) -> Result<()> {
        let mut all = read_state_file(&self.path).await?;
        all.insert(self.key.clone(), self.entries.clone());

        let mut json = serde_json::to_string_pretty(&all)
            .map_err(|e| Error::Sync(format!("cannot serialize sync state: {e}")))?;
        json.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        devloop_issues::write_atomic(&self.path, &json).await?;
        Ok(())
    }

    /// Entry for an issue.
    pub fn get(&self, id: &str) -> Option<&SyncEntry> {
        self.entries.get(id)
    }

    /// Record an entry for an issue.
    pub fn insert(&mut self, id: impl Into<String>, entry: SyncEntry) {
        self.entries.insert(id.into(), entry);
    }

    /// Whether no issue has been synced yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_state_file(path: &Path) -> Result<StateFile> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(StateFile::new()),
        Ok(text) => serde_json::from_str(&text).map_err(|e| {
            Error::Sync(format!("invalid sync state file {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateFile::new()),
        Err(e) => Err(e.into()),
    }
}
