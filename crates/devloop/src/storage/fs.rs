//! File-backed document storage.

use super::DocumentBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The issues document on disk.
///
/// Writes go through [`devloop_issues::write_atomic`], so an interrupted
/// write leaves the previous document in place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentBackend for FileBackend {
    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("Issues file not found: {}", self.path.display()))
            } else {
                Error::Io(e)
            }
        })
    }

    async fn write(&self, contents: &str) -> Result<()> {
        devloop_issues::write_atomic(&self.path, contents).await?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
