//! Version-control collaborator.
//!
//! The loop commits after transitions (see [`CommitPolicy`]), shows the
//! working-tree diff at the Review Gate, and discards uncommitted work when an
//! issue is skipped.

use crate::error::Result;
use git2::{Delta, DiffFormat, DiffOptions, ErrorCode, IndexAddOption, Repository, Signature};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When the loop commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// One commit per transition.
    #[default]
    EveryTransition,
    /// One commit per approved issue, grouping its transitions and work.
    OnApproval,
    /// Never commit.
    Never,
}

impl CommitPolicy {
    /// Whether a plain transition is committed on its own.
    pub fn commits_transitions(self) -> bool {
        self == Self::EveryTransition
    }

    /// Whether an approval is committed.
    pub fn commits_approvals(self) -> bool {
        self != Self::Never
    }
}

/// Operations the loop needs from version control.
pub trait VersionControl: Send + Sync {
    /// Stage `paths` (everything when empty) and commit. Returns the commit
    /// id, or `None` when there was nothing to commit.
    fn commit(&self, message: &str, paths: &[PathBuf]) -> Result<Option<String>>;

    /// Unified diff of the working tree (untracked files included) against
    /// the last commit.
    fn diff(&self) -> Result<String>;

    /// Throw away uncommitted changes, except under the `keep` paths
    /// (relative to the repository root).
    fn discard_changes(&self, keep: &[PathBuf]) -> Result<()>;
}

/// A git working tree, accessed through libgit2.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Open the repository that contains `path`.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())?;
        let root = repo
            .workdir()
            .ok_or_else(|| crate::error::Error::Vcs("bare repositories are not supported".to_string()))?
            .to_path_buf();
        Ok(Self { root })
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }
}

fn head_commit(repo: &Repository) -> Result<Option<git2::Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn workdir_diff<'r>(repo: &'r Repository, head: Option<&git2::Commit<'_>>) -> Result<git2::Diff<'r>> {
    let tree = head.map(git2::Commit::tree).transpose()?;
    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);
    Ok(repo.diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut opts))?)
}

impl VersionControl for GitRepository {
    fn commit(&self, message: &str, paths: &[PathBuf]) -> Result<Option<String>> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        if paths.is_empty() {
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.update_all(["*"].iter(), None)?;
        } else {
            let specs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
            index.add_all(specs.iter().copied(), IndexAddOption::DEFAULT, None)?;
            index.update_all(specs.iter().copied(), None)?;
        }
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = head_commit(&repo)?;
        if let Some(parent) = &parent
            && parent.tree_id() == tree_id
        {
            tracing::debug!("Nothing to commit");
            return Ok(None);
        }

        let tree = repo.find_tree(tree_id)?;
        let sig = repo
            .signature()
            .or_else(|_| Signature::now("devloop", "devloop@localhost"))?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let commit_id = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        tracing::info!(commit = %commit_id, message, "Committed");
        Ok(Some(commit_id.to_string()))
    }

    fn diff(&self) -> Result<String> {
        let repo = self.open()?;
        let head = head_commit(&repo)?;
        let diff = workdir_diff(&repo, head.as_ref())?;

        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin());
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(out)
    }

    fn discard_changes(&self, keep: &[PathBuf]) -> Result<()> {
        let repo = self.open()?;
        let head = head_commit(&repo)?;
        let diff = workdir_diff(&repo, head.as_ref())?;

        let mut restore: Vec<PathBuf> = Vec::new();
        let mut remove: Vec<PathBuf> = Vec::new();
        for delta in diff.deltas() {
            let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                continue;
            };
            if keep.iter().any(|k| path.starts_with(k)) {
                continue;
            }
            match delta.status() {
                Delta::Added | Delta::Untracked => remove.push(path.to_path_buf()),
                _ => restore.push(path.to_path_buf()),
            }
        }

        if restore.is_empty() && remove.is_empty() {
            return Ok(());
        }

        // Unstage first so the checkout below sees HEAD's entries.
        match &head {
            Some(commit) => repo.reset_default(
                Some(commit.as_object()),
                restore.iter().chain(&remove).map(PathBuf::as_path),
            )?,
            None => {
                let mut index = repo.index()?;
                for path in &remove {
                    if index.get_path(path, 0).is_some() {
                        index.remove_path(path)?;
                    }
                }
                index.write()?;
            }
        }

        for path in &remove {
            match std::fs::remove_file(self.root.join(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !restore.is_empty() {
            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.force();
            for path in &restore {
                checkout.path(path.as_path());
            }
            repo.checkout_head(Some(&mut checkout))?;
        }

        tracing::info!(
            restored = restore.len(),
            removed = remove.len(),
            "Discarded uncommitted changes"
        );
        Ok(())
    }
}

/// Used when the project is not under version control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVersionControl;

impl VersionControl for NoVersionControl {
    fn commit(&self, _message: &str, _paths: &[PathBuf]) -> Result<Option<String>> {
        Ok(None)
    }

    fn diff(&self) -> Result<String> {
        Ok(String::new())
    }

    fn discard_changes(&self, _keep: &[PathBuf]) -> Result<()> {
        tracing::warn!("No version control: skipped issue's changes are left in place");
        Ok(())
    }
}
