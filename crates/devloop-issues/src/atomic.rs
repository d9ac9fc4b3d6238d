//! Atomic document writes.
//!
//! A backlog document is rewritten with the temp-file-then-rename pattern:
//!
//! 1. The new text is written to a sibling file with a `.tmp` extension
//! 2. The temporary file is flushed and synced
//! 3. The temporary file is renamed over the target path
//!
//! Renames within one filesystem are atomic on POSIX systems, so a reader (or
//! a crash) sees either the old document or the new one, never a partial
//! write.
//!
//! # Examples
//!
//! ```no_run
//! use devloop_issues::write_atomic;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! write_atomic("specs/feature.issues.md", "Spec: specs/feature.md\n").await?;
//! # Ok(())
//! # }
//! ```

use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Atomically replace the contents of `path` with `contents`.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, or if
/// the rename fails (e.g. across filesystems). On failure the original file is
/// left unchanged and the temporary file is removed on a best-effort basis.
pub async fn write_atomic<P>(path: P, contents: &str) -> Result<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    if let Err(e) = write_to_temp_file(&temp_path, contents).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    tracing::trace!(path = %path.display(), bytes = contents.len(), "Document written");
    Ok(())
}

/// Creates the temporary path used while writing `path`.
///
/// `.tmp` is appended to the existing extension (`feature.issues.md` becomes
/// `feature.issues.md.tmp`), or used as the extension when there is none.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

async fn write_to_temp_file(temp_path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(temp_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}
