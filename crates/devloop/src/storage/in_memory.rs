//! In-memory document storage.

use super::DocumentBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    contents: String,
    writes: usize,
    fail_writes: bool,
}

/// A document held in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a
/// [`BacklogStore`](super::BacklogStore) and inspect the text through another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBackend {
    /// Create a backend holding `contents`.
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                contents: contents.into(),
                ..Inner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave `Inner` half-updated.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current document text.
    pub fn contents(&self) -> String {
        self.lock().contents.clone()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Replace the text without counting a write, as an outside edit would.
    pub fn set_contents(&self, contents: &str) {
        self.lock().contents = contents.to_string();
    }

    /// Make every following write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn read(&self) -> Result<String> {
        Ok(self.contents())
    }

    async fn write(&self, contents: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Storage("write refused by in-memory backend".to_string()));
        }
        inner.contents = contents.to_string();
        inner.writes += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_buffer() {
        let backend = InMemoryBackend::new("one");
        let other = backend.clone();
        other.write("two").await.unwrap();
        assert_eq!(backend.contents(), "two");
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let backend = InMemoryBackend::new("one");
        backend.fail_writes(true);
        assert!(backend.write("two").await.is_err());
        assert_eq!(backend.contents(), "one");

        backend.fail_writes(false);
        backend.write("two").await.unwrap();
        assert_eq!(backend.contents(), "two");
    }
}
