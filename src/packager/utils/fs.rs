//! File system utilities for packaging.
//!
//! Provides idempotent directory handling, executable marking and
//! best-effort cleanup helpers.

use crate::packager::error::{ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        // Try removal, ignore NotFound (idempotent)
        match fs::remove_dir_all(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).fs_context("removing directory", path),
        }
    }

    // create_dir_all is already idempotent - succeeds even if dir exists
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Copies a regular file, creating any parent directories of the destination.
///
/// The raw IO error is returned so callers can tell a missing source
/// (`NotFound`) apart from other failures.
pub async fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir).await?;
    }
    fs::copy(from, to).await?;
    Ok(())
}

/// Marks a file executable (`0o755`). No-op where permissions have no execute bit.
pub async fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .fs_context("marking executable", path)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Removes a file, logging instead of failing. Missing files are fine.
pub async fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn erase_recreates_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("dist");
        create_dir_all(&out, false).await.unwrap();
        tokio::fs::write(out.join("stale"), b"old").await.unwrap();

        create_dir_all(&out, true).await.unwrap();

        let mut entries = tokio::fs::read_dir(&out).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn copy_file_reports_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = copy_file(&tmp.path().join("nope"), &tmp.path().join("a/b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn make_executable_sets_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("bin");
        use std::os::unix::fs::PermissionsExt;

        tokio::fs::write(&file, b"#!").await.unwrap();
        make_executable(&file).await.unwrap();
        let mode = tokio::fs::metadata(&file).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn best_effort_removal_ignores_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        remove_file_best_effort(&tmp.path().join("never-existed")).await;
    }
}
