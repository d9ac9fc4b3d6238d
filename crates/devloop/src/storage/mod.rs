//! Backlog Store: loading and saving the issues document.
//!
//! The store is stateless. Every query reads the document fresh through a
//! [`DocumentBackend`], and every mutation is a read-modify-write that either
//! rewrites the whole document or leaves it untouched:
//!
//! - [`FileBackend`]: the `.issues.md` file on disk, written atomically
//! - [`InMemoryBackend`]: a shared in-memory buffer for tests and previews
//!
//! # Example
//!
//! ```no_run
//! use devloop::domain::IssueId;
//! use devloop::storage::{BacklogStore, FileBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = BacklogStore::new(FileBackend::new("specs/feature.issues.md"));
//!     let backlog = store.load().await?;
//!     println!("{} issues", backlog.issues().len());
//!
//!     store
//!         .update_dev_notes(&IssueId::from_ordinal(1), "Schema settled")
//!         .await?;
//!     Ok(())
//! }
//! ```

mod fs;
mod in_memory;

pub use fs::FileBackend;
pub use in_memory::InMemoryBackend;

use crate::domain::{Backlog, IssueId, IssueStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Where the document text lives.
///
/// Implementations must make `write` all-or-nothing: after a failed write the
/// previous text is still what `read` returns.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read the whole document.
    async fn read(&self) -> Result<String>;

    /// Replace the whole document.
    async fn write(&self, contents: &str) -> Result<()>;

    /// Human-readable location, used in logs and sync-state keys.
    fn location(&self) -> String;
}

/// Raw issue text handed to the implementation agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDetail {
    /// Issue identifier.
    pub id: IssueId,
    /// Issue title.
    pub title: String,
    /// The issue block as written, heading to last line.
    pub block: String,
    /// Parent spec named on the `Spec:` line.
    pub spec_ref: String,
}

/// Loads and saves a [`Backlog`] through an injected backend.
pub struct BacklogStore {
    backend: Box<dyn DocumentBackend>,
}

impl std::fmt::Debug for BacklogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacklogStore")
            .field("location", &self.backend.location())
            .finish()
    }
}

impl BacklogStore {
    /// Create a store over a backend.
    pub fn new(backend: impl DocumentBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Location of the underlying document.
    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Read and parse the document.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if the document violates the grammar
    /// - `Error::Io` if it cannot be read
    pub async fn load(&self) -> Result<Backlog> {
        let text = self.backend.read().await?;
        let backlog = Backlog::parse(&text)?;
        tracing::debug!(
            location = %self.backend.location(),
            issues = backlog.issues().len(),
            "Loaded backlog"
        );
        Ok(backlog)
    }

    /// Write a backlog back to the document.
    ///
    /// Unchanged issues and prose render byte for byte as they were read.
    pub async fn save(&self, backlog: &Backlog) -> Result<()> {
        self.backend.write(&backlog.render()).await?;
        tracing::debug!(location = %self.backend.location(), "Saved backlog");
        Ok(())
    }

    /// Load, apply `f`, and save if `f` succeeded and changed the text.
    ///
    /// Nothing is written when `f` fails, so the document is either fully
    /// updated or untouched.
    pub async fn modify<T, F>(&self, f: F) -> Result<(Backlog, T)>
    where
        F: FnOnce(&mut Backlog) -> Result<T> + Send,
        T: Send,
    {
        let text = self.backend.read().await?;
        let mut backlog = Backlog::parse(&text)?;
        let value = f(&mut backlog)?;

        if backlog.render() != text {
            self.save(&backlog).await?;
        }
        Ok((backlog, value))
    }

    /// Move an issue to `status`, validating the edge against the status
    /// read in the same load. Returns the new backlog and the previous status.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTransition` if the transition graph has no such edge
    /// - `Error::IssueNotFound` if the issue is not in the backlog
    pub async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
    ) -> Result<(Backlog, IssueStatus)> {
        self.modify(|backlog| backlog.transition(id, status)).await
    }

    /// Append a paragraph to an issue's dev notes.
    ///
    /// # Errors
    ///
    /// - `Error::IssueNotFound` if the issue is not in the backlog
    /// - `Error::Storage` if the text contains lines that would change the
    ///   document structure (`---`, markdown headings, `**Field:**` lines)
    pub async fn update_dev_notes(&self, id: &IssueId, text: &str) -> Result<Backlog> {
        let (backlog, changed) = self
            .modify(|backlog| backlog.append_dev_notes(id, text))
            .await?;
        if changed {
            tracing::info!(issue = %id, "Dev notes updated");
        }
        Ok(backlog)
    }

    /// The raw issue block and parent spec reference for one issue.
    pub async fn issue_detail(&self, id: &IssueId) -> Result<IssueDetail> {
        let backlog = self.load().await?;
        let issue = backlog
            .get(id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;
        let block = backlog
            .block_text(id)
            .ok_or_else(|| Error::IssueNotFound(id.clone()))?;

        Ok(IssueDetail {
            id: id.clone(),
            title: issue.title.clone(),
            block,
            spec_ref: backlog.spec_ref().to_string(),
        })
    }
}
