//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use devloop::agent::{Agent, AgentReport, AgentRequest};
use devloop::domain::IssueStatus;
use devloop::error::{Error, Result};
use devloop::review::{DecisionSource, ScriptedDecisions};
use devloop::storage::{BacklogStore, InMemoryBackend};
use devloop::sync::{SyncBridge, TrackerAdapter, TrackerItem};
use devloop::transition::TransitionEngine;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Run the devloop binary in `dir` with colors off.
pub fn run_devloop_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devloop"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute devloop binary")
}

/// Build a document from `(ordinal, dependencies, status)` triples.
pub fn backlog_doc(blocks: &[(u64, &str, &str)]) -> String {
    let mut text = String::from("# Feature issues\n\nSpec: specs/feature.md\n");
    for (ordinal, deps, status) in blocks {
        text.push_str(&format!(
            "\n---\n\n### ISSUE-{ordinal}: Issue {ordinal}\n\n**Status:** {status}\n**Dependencies:** {deps}\n\n- [ ] First criterion\n- [ ] Second criterion\n\n**Dev notes:**\n_(filled by dev-loop during implementation)_\n"
        ));
    }
    text
}

/// An engine over an in-memory document with no tracker.
pub fn engine_over(doc: &str) -> (TransitionEngine, InMemoryBackend) {
    let backend = InMemoryBackend::new(doc);
    let engine = TransitionEngine::new(BacklogStore::new(backend.clone()), SyncBridge::disabled());
    (engine, backend)
}

/// An engine whose sync bridge mirrors to `tracker`, keeping state in `dir`.
pub fn engine_with_tracker(
    doc: &str,
    tracker: impl TrackerAdapter + 'static,
    dir: &TempDir,
) -> (TransitionEngine, InMemoryBackend) {
    let backend = InMemoryBackend::new(doc);
    let bridge = SyncBridge::new(
        Box::new(tracker),
        dir.path().join("sync-state.json"),
        "specs/feature.issues.md",
    );
    let engine = TransitionEngine::new(BacklogStore::new(backend.clone()), bridge);
    (engine, backend)
}

/// Status of an issue as written in the document text.
pub fn status_in(contents: &str, ordinal: u64) -> IssueStatus {
    let backlog = devloop::domain::Backlog::parse(contents).expect("document parses");
    backlog
        .get(&devloop::domain::IssueId::from_ordinal(ordinal))
        .expect("issue exists")
        .status
}

type Behaviour = dyn Fn(&AgentRequest) -> AgentReport + Send + Sync;

/// An agent driven by a closure, recording every request.
#[derive(Clone)]
pub struct FakeAgent {
    behaviour: Arc<Behaviour>,
    requests: Arc<Mutex<Vec<AgentRequest>>>,
}

impl FakeAgent {
    pub fn new(behaviour: impl Fn(&AgentRequest) -> AgentReport + Send + Sync + 'static) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            requests: Arc::default(),
        }
    }

    /// Reports every criterion of a two-criterion issue as met.
    pub fn satisfying() -> Self {
        Self::new(|request| AgentReport {
            satisfied_criteria: vec![0, 1],
            dev_notes: Some(format!("Implemented {}", request.issue_id)),
            summary: format!("Done with {}", request.issue_id),
            exit_code: Some(0),
        })
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn implement(&self, request: &AgentRequest) -> Result<AgentReport> {
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.behaviour)(request))
    }
}

/// A tracker that rejects every call.
#[derive(Clone, Default)]
pub struct FailingTracker {
    calls: Arc<AtomicUsize>,
}

impl FailingTracker {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackerAdapter for FailingTracker {
    fn name(&self) -> &str {
        "failing"
    }

    async fn create_item(&self, _item: &TrackerItem) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Sync("tracker unreachable".to_string()))
    }

    async fn update_status(&self, _external_id: &str, _status: IssueStatus) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Sync("tracker unreachable".to_string()))
    }
}

/// Scripted review input that stays inspectable after the loop takes it.
#[derive(Clone, Default)]
pub struct SharedDecisions {
    inner: Arc<tokio::sync::Mutex<ScriptedDecisions>>,
}

impl SharedDecisions {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(ScriptedDecisions::new(inputs))),
        }
    }

    pub async fn presented(&self) -> Vec<String> {
        self.inner.lock().await.presented().to_vec()
    }

    pub async fn remaining(&self) -> usize {
        self.inner.lock().await.remaining()
    }
}

#[async_trait]
impl DecisionSource for SharedDecisions {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.inner.lock().await.read_line(prompt).await
    }

    fn present(&mut self, text: &str) {
        // The loop never presents while a read is pending.
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.present(text);
        }
    }
}
