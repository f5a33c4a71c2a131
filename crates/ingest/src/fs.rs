//! Filesystem helpers shared by the credential and record stores.

use std::io;
use std::path::{Path, PathBuf};

/// Sibling path used as the staging file for [`write_atomic`].
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensure the parent directory of a file path exists.
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Write `contents` to a staging file next to `path` and rename it into place,
/// so readers never observe a half-written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path).await?;
    let staging = staging_path(path);
    tokio::fs::write(&staging, contents).await?;
    tokio::fs::rename(&staging, path).await
}

/// Read a file, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file, treating "not found" as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_leaves_no_staging_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested").join("projects.json");

        write_atomic(&target, b"{}").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&target).await.unwrap(), "{}");
        assert!(!staging_path(&target).exists());
    }

    #[tokio::test]
    async fn test_read_optional_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.json");
        assert!(read_optional(&missing).await.unwrap().is_none());
        remove_if_exists(&missing).await.unwrap();
    }
}
