//! Path management for SRS Writer files.
//!
//! # Directory Structure
//!
//! ```text
//! <workspace>/
//! ├── .srs-writer.toml                         # Workspace configuration (optional)
//! ├── .session-log/
//! │   ├── srs-writer-session_main.json         # Session outside any project
//! │   ├── srs-writer-session_<project>.json    # One unified file per project
//! │   └── .intentional-exit.json               # Short-lived recovery suppression flag
//! ├── .srs-trash/                              # Deleted projects, recoverable
//! └── <project>/                               # Project directory (baseDir)
//!
//! ~/.config/srs-writer/                        # User config directory
//! ├── config.toml
//! └── logs/
//! ```

use srsw_core::error::{Result, SrsError};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "srs-writer";
const SESSION_LOG_DIR: &str = ".session-log";
const SESSION_FILE_PREFIX: &str = "srs-writer-session_";
const SESSION_FILE_SUFFIX: &str = ".json";
const MAIN_SESSION_LABEL: &str = "main";
const EXIT_FLAG_FILE: &str = ".intentional-exit.json";
const WORKSPACE_CONFIG_FILE: &str = ".srs-writer.toml";

/// User-level paths, resolved via the platform config directory.
pub struct SrsPaths;

impl SrsPaths {
    /// Returns the SRS Writer configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/srs-writer/`)
    /// - `Err(SrsError::Config)`: The platform config directory is unknown
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| SrsError::config("Cannot determine the user config directory"))
    }

    /// Returns the path to the user configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Returns the path of the optional per-workspace configuration file.
    pub fn workspace_config_file(workspace_root: &Path) -> PathBuf {
        workspace_root.join(WORKSPACE_CONFIG_FILE)
    }
}

/// Workspace-relative paths used by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    workspace_root: PathBuf,
    trash_dir_name: String,
}

impl SessionPaths {
    /// Creates paths rooted at `workspace_root`, moving deleted projects into
    /// `<workspace_root>/<trash_dir_name>`.
    pub fn new(workspace_root: impl Into<PathBuf>, trash_dir_name: impl Into<String>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            trash_dir_name: trash_dir_name.into(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// `<workspace>/.session-log`
    pub fn session_log_dir(&self) -> PathBuf {
        self.workspace_root.join(SESSION_LOG_DIR)
    }

    /// Unified session file of a project, or of the main session when `project`
    /// is `None`.
    pub fn session_file(&self, project: Option<&str>) -> PathBuf {
        let label = project.unwrap_or(MAIN_SESSION_LABEL);
        self.session_log_dir()
            .join(format!("{}{}{}", SESSION_FILE_PREFIX, label, SESSION_FILE_SUFFIX))
    }

    pub fn main_session_file(&self) -> PathBuf {
        self.session_file(None)
    }

    pub fn exit_flag_file(&self) -> PathBuf {
        self.session_log_dir().join(EXIT_FLAG_FILE)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.workspace_root.join(&self.trash_dir_name)
    }

    /// Default project directory for a new project.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.workspace_root.join(project)
    }

    /// Recovers the project label from a session file name.
    ///
    /// Returns `None` for foreign files and for the main session file.
    pub fn project_from_file_name(file_name: &str) -> Option<&str> {
        let label = file_name
            .strip_prefix(SESSION_FILE_PREFIX)?
            .strip_suffix(SESSION_FILE_SUFFIX)?;
        if label.is_empty() || label == MAIN_SESSION_LABEL {
            return None;
        }
        Some(label)
    }
}
