//! Implementation of the `init` command and the project configuration.
//!
//! `devloop init` creates `.devloop/` with a `config.yaml` pointing at the
//! issues document, and a starter issues document when none exists yet.

use crate::error::{Error, Result};
use crate::vcs::CommitPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Default issues document, relative to the project root.
pub const DEFAULT_ISSUES_FILE: &str = "specs/feature.issues.md";

/// Name of the devloop directory.
pub const DEVLOOP_DIR_NAME: &str = ".devloop";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the gitignore file within `.devloop`.
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Default sync state file, relative to the project root.
pub const DEFAULT_STATE_FILE: &str = ".devloop/sync-state.json";

/// Tracker name that disables mirroring.
pub const NO_TRACKER: &str = "none";

/// Maximum directory depth to traverse when searching for the project root.
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Extension every issues document must have.
pub const ISSUES_FILE_EXTENSION: &str = ".md";

/// Project configuration (`.devloop/config.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DevloopConfig {
    /// Issues document, relative to the project root.
    pub issues_file: String,

    /// When the loop commits.
    #[serde(default)]
    pub commit_policy: CommitPolicy,

    /// Implementation agent.
    #[serde(default)]
    pub agent: AgentConfig,

    /// External tracker.
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Agent section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct AgentConfig {
    /// Program to run.
    pub command: String,
    /// Arguments passed before the prompt is written to stdin.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: ["-p", "--output-format", "stream-json", "--verbose"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Tracker section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TrackerConfig {
    /// Adapter name, or `none`.
    pub name: String,
    /// Sync state file, relative to the project root.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: NO_TRACKER.to_string(),
            state_file: default_state_file(),
        }
    }
}

impl DevloopConfig {
    /// Configuration for an issues document with every other setting at its
    /// default.
    pub fn new(issues_file: &str) -> Self {
        Self {
            issues_file: issues_file.to_string(),
            commit_policy: CommitPolicy::default(),
            agent: AgentConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }

    /// Load configuration from a file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        validate_issues_file(&config.issues_file)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for DevloopConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ISSUES_FILE)
    }
}

/// Result of the init command.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created devloop directory.
    pub devloop_dir: PathBuf,
    /// Path to the created config file.
    pub config_file: PathBuf,
    /// Path to the created gitignore file.
    pub gitignore_file: PathBuf,
    /// Path to the issues document.
    pub issues_file: PathBuf,
    /// Whether a starter issues document was written.
    pub created_issues_file: bool,
}

/// Validate an issues-document path from the command line or config.
///
/// Requirements:
/// - not empty
/// - relative, without `..` components
/// - ends in `.md`
pub fn validate_issues_file(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::Config("Issues file path cannot be empty".to_string()));
    }

    let as_path = Path::new(path);
    if as_path.is_absolute() || as_path.has_root() {
        return Err(Error::Config(format!(
            "Issues file must be relative to the project root, got '{path}'"
        )));
    }
    if as_path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::Config(format!(
            "Issues file cannot leave the project root, got '{path}'"
        )));
    }
    if !path.ends_with(ISSUES_FILE_EXTENSION) {
        return Err(Error::Config(format!(
            "Issues file must be a markdown file ending in '{ISSUES_FILE_EXTENSION}', got '{path}'"
        )));
    }
    Ok(())
}

fn starter_document(issues_file: &str) -> String {
    let spec = issues_file
        .strip_suffix(".issues.md")
        .map_or_else(|| "specs/feature.md".to_string(), |stem| format!("{stem}.md"));
    format!(
        "# Issues\n\nSpec: {spec}\n\n---\n\n\
         ### ISSUE-1: First issue\n\
         **Dependencies:** none\n\
         **Status:** Backlog\n\n\
         Describe the change.\n\n\
         **Acceptance criteria:**\n\
         - [ ] First criterion\n\n\
         **Dev notes:** {}\n",
        devloop_issues::DEV_NOTES_PLACEHOLDER
    )
}

/// Initialize devloop in the given directory.
///
/// # Errors
///
/// Returns an error if:
/// - `.devloop/` already exists
/// - the issues file path is invalid
/// - file system operations fail
pub async fn init(base_dir: &Path, issues_file: Option<&str>) -> Result<InitResult> {
    let issues_file = issues_file.unwrap_or(DEFAULT_ISSUES_FILE).trim();
    validate_issues_file(issues_file)?;

    let devloop_dir = base_dir.join(DEVLOOP_DIR_NAME);
    if devloop_dir.exists() {
        return Err(Error::Config(format!(
            "Devloop is already initialized in this directory. Found existing '{DEVLOOP_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&devloop_dir).await?;

    let config_file = devloop_dir.join(CONFIG_FILE_NAME);
    DevloopConfig::new(issues_file).save(&config_file).await?;

    let gitignore_file = devloop_dir.join(GITIGNORE_FILE_NAME);
    fs::write(
        &gitignore_file,
        "# Temporary files from interrupted atomic writes\n*.tmp\n",
    )
    .await?;

    let issues_path = base_dir.join(issues_file);
    let created_issues_file = !issues_path.exists();
    if created_issues_file {
        if let Some(parent) = issues_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&issues_path, starter_document(issues_file)).await?;
    }

    tracing::info!(issues_file, created_issues_file, "Initialized devloop");
    Ok(InitResult {
        devloop_dir,
        config_file,
        gitignore_file,
        issues_file: issues_path,
        created_issues_file,
    })
}

/// Find the project root by searching up the directory tree for `.devloop/`.
///
/// Returns `None` if no project is found within the depth limit.
pub fn find_devloop_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(DEVLOOP_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
