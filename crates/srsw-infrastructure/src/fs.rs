//! Local file system backed by `tokio::fs`.
//!
//! Writes are atomic: content goes to a hidden temporary file in the target
//! directory, is synced, then renamed over the destination. A crash mid-write
//! leaves either the old file or the new one, never a truncated mix.

use async_trait::async_trait;
use srsw_core::fs::FileSystem;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Gets a temporary file path for atomic writes.
    fn temp_path(path: &Path) -> io::Result<PathBuf> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
        })?;
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no file name"))?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = Self::temp_path(path)?;
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        tmp_file.write_all(contents.as_bytes()).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    async fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        tokio::fs::canonicalize(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parents_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let path = temp_dir.path().join("nested/dir/file.json");

        fs.write(&path, "{\"a\":1}").await.unwrap();
        fs.write(&path, "{\"a\":2}").await.unwrap();

        assert_eq!(fs.read_to_string(&path).await.unwrap(), "{\"a\":2}");
        let names = fs.read_dir_names(path.parent().unwrap()).await.unwrap();
        assert_eq!(names, vec!["file.json".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_keeps_not_found_kind() {
        let temp_dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let missing = temp_dir.path().join("missing.json");

        let err = fs.read_to_string(&missing).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.exists(&missing).await);
        assert!(fs.is_dir(temp_dir.path()).await);
    }

    #[tokio::test]
    async fn test_rename_moves_directories() {
        let temp_dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        let from = temp_dir.path().join("old");
        let to = temp_dir.path().join("new");
        fs.create_dir_all(&from).await.unwrap();
        fs.write(&from.join("doc.md"), "# SRS").await.unwrap();

        fs.rename(&from, &to).await.unwrap();

        assert!(!fs.exists(&from).await);
        assert_eq!(fs.read_to_string(&to.join("doc.md")).await.unwrap(), "# SRS");
    }
}
