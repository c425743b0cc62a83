//! Intentional exit flag.
//!
//! Written when the user deliberately leaves a project so that the next
//! activation does not immediately restore it from the Git branch.

use serde::{Deserialize, Serialize};
use srsw_core::error::Result;
use srsw_core::fs::FileSystem;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Persisted `{ timestamp, reason }` marker. `timestamp` is in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFlag {
    pub timestamp: i64,
    pub reason: String,
}

impl ExitFlag {
    pub fn now(reason: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason: reason.into(),
        }
    }

    /// Milliseconds elapsed between the flag and `now_ms`. Never negative.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.timestamp).max(0)
    }
}

/// Reads and writes the exit flag file.
#[derive(Clone)]
pub struct ExitFlagRepository {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl ExitFlagRepository {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    /// Persists a fresh flag.
    pub async fn mark_intentional_exit(&self, reason: &str) -> Result<()> {
        let flag = ExitFlag::now(reason);
        let json = serde_json::to_string_pretty(&flag)?;
        if let Some(parent) = self.path.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        self.fs.write(&self.path, &json).await?;
        tracing::info!("[ExitFlag] Intentional exit recorded: {}", reason);
        Ok(())
    }

    /// Reads the flag. A missing file is `None`; so is an unreadable or
    /// malformed one, which is logged.
    pub async fn read(&self) -> Option<ExitFlag> {
        let content = match self.fs.read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("[ExitFlag] Failed to read exit flag: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(flag) => Some(flag),
            Err(e) => {
                tracing::warn!("[ExitFlag] Ignoring malformed exit flag: {}", e);
                None
            }
        }
    }

    /// Removes the flag. Removing a flag that does not exist is not an error.
    pub async fn clear(&self) -> Result<()> {
        match self.fs.remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TokioFileSystem;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mark_read_clear() {
        let temp_dir = TempDir::new().unwrap();
        let repo = ExitFlagRepository::new(
            Arc::new(TokioFileSystem::new()),
            temp_dir.path().join(".session-log/.intentional-exit.json"),
        );

        assert!(repo.read().await.is_none());
        repo.mark_intentional_exit("user closed project").await.unwrap();

        let flag = repo.read().await.unwrap();
        assert_eq!(flag.reason, "user closed project");
        assert!(flag.age_ms(chrono::Utc::now().timestamp_millis()) < 60_000);

        repo.clear().await.unwrap();
        assert!(repo.read().await.is_none());
        repo.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_flag_reads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let fs = Arc::new(TokioFileSystem::new());
        let path = temp_dir.path().join(".intentional-exit.json");
        fs.write(&path, "yesterday").await.unwrap();

        let repo = ExitFlagRepository::new(fs, path);
        assert!(repo.read().await.is_none());
    }

    #[test]
    fn test_age_is_never_negative() {
        let flag = ExitFlag {
            timestamp: 10_000,
            reason: "x".into(),
        };
        assert_eq!(flag.age_ms(4_000), 0);
        assert_eq!(flag.age_ms(70_000), 60_000);
    }
}
