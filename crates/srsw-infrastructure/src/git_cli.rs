//! Git branch lookup through the `git` command line.

use async_trait::async_trait;
use srsw_core::error::{Result, SrsError};
use srsw_core::git::GitBranchProvider;
use std::path::Path;
use tokio::process::Command;

/// Runs `git rev-parse --abbrev-ref HEAD` inside the workspace.
#[derive(Debug, Clone)]
pub struct GitCliBranchProvider {
    git_binary: String,
}

impl Default for GitCliBranchProvider {
    fn default() -> Self {
        Self {
            git_binary: "git".to_string(),
        }
    }
}

impl GitCliBranchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `git` executable instead of the one on `PATH`.
    pub fn with_binary(mut self, git_binary: impl Into<String>) -> Self {
        self.git_binary = git_binary.into();
        self
    }
}

#[async_trait]
impl GitBranchProvider for GitCliBranchProvider {
    async fn current_branch(&self, workspace_root: &Path) -> Result<String> {
        let output = Command::new(&self.git_binary)
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(workspace_root)
            .output()
            .await
            .map_err(|e| SrsError::Git(format!("Failed to run {}: {}", self.git_binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SrsError::Git(format!(
                "git rev-parse failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if branch.is_empty() {
            return Err(SrsError::Git("git returned an empty branch name".to_string()));
        }

        tracing::debug!("[GitCli] Current branch: {}", branch);
        Ok(branch)
    }
}
