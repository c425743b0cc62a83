//! Session domain model.
//!
//! `SessionContext` answers "which project am I working on right now". It is
//! serialized inside the unified session file, so field names follow the
//! camelCase layout users see when they open that file.

use crate::error::{Result, SrsError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema tag written into `SessionMetadata::version` for new sessions.
pub const SESSION_SCHEMA_VERSION: &str = "5.0";

fn new_session_context_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Bookkeeping attached to every session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Timestamp when the session was created (ISO 8601 format)
    pub created: String,
    /// Timestamp of the last mutation (ISO 8601 format)
    pub last_modified: String,
    /// Schema/format version tag
    pub version: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        let now = now_rfc3339();
        Self {
            created: now.clone(),
            last_modified: now,
            version: SESSION_SCHEMA_VERSION.to_string(),
        }
    }
}

/// The authoritative description of the active project.
///
/// A `None` project name means workspace-root mode. Whenever a project name is
/// present, `base_dir` must point at the project's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Opaque identifier, generated once per session lifetime
    #[serde(default = "new_session_context_id")]
    pub session_context_id: String,
    /// Active project, `None` for workspace-root mode
    #[serde(default)]
    pub project_name: Option<String>,
    /// Absolute path of the project directory
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Files produced by the project, in creation order
    #[serde(default)]
    pub active_files: Vec<String>,
    /// Last known Git branch (advisory only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl SessionContext {
    /// Creates a fresh session with a new identifier.
    pub fn new(project_name: Option<String>, base_dir: Option<String>) -> Self {
        Self {
            session_context_id: new_session_context_id(),
            project_name,
            base_dir,
            active_files: Vec::new(),
            git_branch: None,
            metadata: SessionMetadata::default(),
        }
    }

    /// Returns true when `base_dir` holds a non-blank path.
    pub fn has_base_dir(&self) -> bool {
        self.base_dir
            .as_deref()
            .is_some_and(|dir| !dir.trim().is_empty())
    }

    /// Rejects snapshots that cannot be adopted as a working session.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::InvalidSessionFile` with "baseDir is missing or empty"
    /// when `base_dir` is absent, null or blank.
    pub fn validate(&self) -> Result<()> {
        if !self.has_base_dir() {
            return Err(SrsError::missing_base_dir());
        }
        Ok(())
    }

    /// Display label used in logs and operation descriptions.
    pub fn label(&self) -> &str {
        self.project_name.as_deref().unwrap_or("main")
    }

    /// Applies a partial update and bumps `last_modified`.
    ///
    /// Top-level fields are replaced; `metadata` is merged field by field so
    /// `created` survives every update.
    ///
    /// # Returns
    ///
    /// The names of the fields that were touched, in declaration order.
    pub fn apply(&mut self, patch: &SessionPatch) -> Vec<&'static str> {
        let mut changed = Vec::new();

        if let Some(project_name) = &patch.project_name {
            self.project_name = project_name.clone();
            changed.push("projectName");
        }
        if let Some(base_dir) = &patch.base_dir {
            self.base_dir = base_dir.clone();
            changed.push("baseDir");
        }
        if let Some(active_files) = &patch.active_files {
            self.active_files = active_files.clone();
            changed.push("activeFiles");
        }
        if let Some(git_branch) = &patch.git_branch {
            self.git_branch = git_branch.clone();
            changed.push("gitBranch");
        }
        if let Some(version) = &patch.metadata_version {
            self.metadata.version = version.clone();
            changed.push("metadata.version");
        }

        self.metadata.last_modified = now_rfc3339();
        changed
    }
}

/// A partial update for [`SessionContext`].
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub project_name: Option<Option<String>>,
    pub base_dir: Option<Option<String>>,
    pub active_files: Option<Vec<String>>,
    pub git_branch: Option<Option<String>>,
    pub metadata_version: Option<String>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_name(mut self, name: Option<String>) -> Self {
        self.project_name = Some(name);
        self
    }

    pub fn base_dir(mut self, dir: Option<String>) -> Self {
        self.base_dir = Some(dir);
        self
    }

    pub fn active_files(mut self, files: Vec<String>) -> Self {
        self.active_files = Some(files);
        self
    }

    pub fn git_branch(mut self, branch: Option<String>) -> Self {
        self.git_branch = Some(branch);
        self
    }

    pub fn metadata_version(mut self, version: impl Into<String>) -> Self {
        self.metadata_version = Some(version.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
