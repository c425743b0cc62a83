//! Version-control side channel.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Queries the Git branch currently checked out in a workspace.
#[async_trait]
pub trait GitBranchProvider: Send + Sync {
    /// Returns the current branch name.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Git` when the workspace is not a repository or the
    /// query cannot be executed.
    async fn current_branch(&self, workspace_root: &Path) -> Result<String>;
}
