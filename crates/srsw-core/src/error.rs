//! Error types for SRS Writer.

use thiserror::Error;

/// A shared error type for the whole SRS Writer core.
///
/// Variants are grouped by how callers are expected to react:
/// validation and data-integrity failures are reported to the user as-is,
/// infrastructure failures carry enough context for diagnostics, and model
/// invocation failures carry their retry classification.
#[derive(Error, Debug, Clone)]
pub enum SrsError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A project's unified session file does not exist
    #[error("Session file not found for project '{project}': {path}")]
    SessionFileNotFound { project: String, path: String },

    /// A session file exists but cannot be trusted as a session
    #[error("Invalid session file: {0}")]
    InvalidSessionFile(String),

    /// Project name failed the allow-list check
    #[error("Invalid project name '{name}': {reason}")]
    InvalidProjectName { name: String, reason: String },

    /// A project with the requested name already exists
    #[error("Project already exists: {0}")]
    ProjectExists(String),

    /// A path resolved outside of the workspace root
    #[error("Path is outside the workspace root: {0}")]
    PathOutsideWorkspace(String),

    /// Generic validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session file format migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Git query failure
    #[error("Git error: {0}")]
    Git(String),

    /// Model invocation failed with a non-retryable classification
    #[error("{user_message}")]
    ModelRejected {
        category: String,
        user_message: String,
        original: String,
    },

    /// Model invocation kept failing after the retry budget was spent
    #[error("{category} error after {attempts} attempt(s): {message}")]
    ModelRetriesExhausted {
        category: String,
        attempts: u32,
        message: String,
    },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SrsError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an InvalidProjectName error
    pub fn invalid_project_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProjectName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidSessionFile error
    pub fn invalid_session_file(message: impl Into<String>) -> Self {
        Self::InvalidSessionFile(message.into())
    }

    /// The error raised whenever a session claims a project but has no directory.
    pub fn missing_base_dir() -> Self {
        Self::InvalidSessionFile("baseDir is missing or empty".to_string())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a Migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::SessionFileNotFound { .. }
        )
    }

    /// Check if this is a validation-class error (never retried, always surfaced)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidProjectName { .. }
                | Self::ProjectExists(_)
                | Self::PathOutsideWorkspace(_)
                | Self::Validation(_)
                | Self::InvalidSessionFile(_)
        )
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this error came out of the model retry layer
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::ModelRejected { .. } | Self::ModelRetriesExhausted { .. }
        )
    }

    /// Returns the retry category for model errors.
    pub fn model_category(&self) -> Option<&str> {
        match self {
            Self::ModelRejected { category, .. } | Self::ModelRetriesExhausted { category, .. } => {
                Some(category.as_str())
            }
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SrsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SrsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SrsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SrsError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for SrsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// A type alias for `Result<T, SrsError>`.
pub type Result<T> = std::result::Result<T, SrsError>;
