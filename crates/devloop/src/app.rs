//! Application context for CLI command execution.
//!
//! `App` finds the project, loads `.devloop/config.yaml`, and builds the
//! collaborators each command needs: the store, the transition engine with its
//! sync bridge, version control and the dev loop.
//!
//! # Example
//!
//! ```no_run
//! use devloop::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new("."), None).await?;
//!     let backlog = app.store().load().await?;
//!     println!("{} issues", backlog.issues().len());
//!     Ok(())
//! }
//! ```

use crate::agent::CommandAgent;
use crate::commands::init::{CONFIG_FILE_NAME, DEVLOOP_DIR_NAME, DevloopConfig, NO_TRACKER, find_devloop_root};
use crate::dev_loop::DevLoop;
use crate::error::{Error, Result};
use crate::review::DecisionSource;
use crate::storage::{BacklogStore, FileBackend};
use crate::sync::SyncBridge;
use crate::transition::TransitionEngine;
use crate::vcs::{GitRepository, NoVersionControl, VersionControl};
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
#[derive(Debug, Clone)]
pub struct App {
    /// Project root (the directory holding `.devloop/`, or the working
    /// directory when running on an explicit file).
    root: PathBuf,

    config: DevloopConfig,

    /// Absolute path of the issues document.
    issues_path: PathBuf,
}

impl App {
    /// Create an App from the given working directory.
    ///
    /// Searches up the directory tree for `.devloop/` and loads its
    /// configuration. With `file_override`, the given issues file is used
    /// instead of the configured one, and a project without `.devloop/` runs
    /// on defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No devloop project is found and no file was given
    /// - Configuration cannot be loaded
    pub async fn from_directory(working_dir: &Path, file_override: Option<&Path>) -> Result<Self> {
        let (root, mut config) = match find_devloop_root(working_dir) {
            Some(root) => {
                let config_path = root.join(DEVLOOP_DIR_NAME).join(CONFIG_FILE_NAME);
                let config = DevloopConfig::load(&config_path).await?;
                (root, config)
            }
            None if file_override.is_some() => (working_dir.to_path_buf(), DevloopConfig::default()),
            None => {
                return Err(Error::Config(
                    "Not a devloop project (or any parent directory). Run 'devloop init' first, or pass --file"
                        .to_string(),
                ));
            }
        };

        let issues_path = match file_override {
            Some(file) => {
                let path = working_dir.join(file);
                config.issues_file = path
                    .strip_prefix(&root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                path
            }
            None => root.join(&config.issues_file),
        };

        tracing::debug!(
            root = %root.display(),
            issues = %issues_path.display(),
            "Loaded project"
        );

        Ok(Self {
            root,
            config,
            issues_path,
        })
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded configuration. `issues_file` reflects any `--file` override.
    pub fn config(&self) -> &DevloopConfig {
        &self.config
    }

    /// Path of the issues document.
    pub fn issues_path(&self) -> &Path {
        &self.issues_path
    }

    /// A store over the issues document.
    pub fn store(&self) -> BacklogStore {
        BacklogStore::new(FileBackend::new(&self.issues_path))
    }

    /// The sync bridge configured for this project.
    ///
    /// No tracker adapters are bundled; a named tracker yields a bridge that
    /// reports a sync failure on every mirror.
    pub fn sync_bridge(&self) -> SyncBridge {
        let tracker = &self.config.tracker;
        if tracker.name == NO_TRACKER {
            return SyncBridge::disabled();
        }
        SyncBridge::unavailable(
            format!("tracker '{}' is not available in this build", tracker.name),
            self.root.join(&tracker.state_file),
            self.config.issues_file.clone(),
        )
    }

    /// A transition engine over the store and sync bridge.
    pub fn engine(&self) -> TransitionEngine {
        TransitionEngine::new(self.store(), self.sync_bridge())
    }

    /// Version control for the project, with the devloop-owned paths
    /// relative to the repository root.
    pub fn vcs(&self) -> (Box<dyn VersionControl>, Vec<PathBuf>) {
        match GitRepository::discover(&self.root) {
            Ok(git) => match self.bookkeeping_paths(git.root()) {
                Ok(paths) => (Box::new(git), paths),
                Err(e) => {
                    tracing::warn!(error = %e, "Project lies outside its git working tree; not committing");
                    (Box::new(NoVersionControl), Vec::new())
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "No git repository");
                (Box::new(NoVersionControl), Vec::new())
            }
        }
    }

    /// The issues file and `.devloop/`, relative to `repo_root`.
    fn bookkeeping_paths(&self, repo_root: &Path) -> Result<Vec<PathBuf>> {
        let repo_root = repo_root.canonicalize()?;
        let root = self.root.canonicalize()?;
        let issues = self.issues_path.canonicalize()?;

        [issues, root.join(DEVLOOP_DIR_NAME)]
            .iter()
            .map(|path| {
                path.strip_prefix(&repo_root)
                    .map(Path::to_path_buf)
                    .map_err(|_| Error::Vcs(format!("{} is not inside {}", path.display(), repo_root.display())))
            })
            .collect()
    }

    /// A dev loop running the configured agent, reading review decisions
    /// from `decisions`.
    pub fn dev_loop(&self, decisions: Box<dyn DecisionSource>) -> DevLoop {
        let agent = CommandAgent::new(
            self.config.agent.command.clone(),
            self.config.agent.args.clone(),
            &self.root,
        );
        let (vcs, bookkeeping) = self.vcs();
        DevLoop::new(self.engine(), Box::new(agent), decisions)
            .with_vcs(vcs)
            .with_commit_policy(self.config.commit_policy)
            .with_spec_root(&self.root)
            .with_bookkeeping_paths(bookkeeping)
    }
}
