//! Application configuration.
//!
//! ```toml
//! [iteration]
//! globalDefault = 10
//! [iteration.categoryDefaults]
//! content = 15
//! process = 10
//! [iteration.specialistOverrides]
//! fr_writer = 20
//!
//! [model]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [workspace]
//! trash_dir_name = ".srs-trash"
//! ```
//!
//! The `iteration` table keeps the camelCase keys used by the editor settings
//! so the same snippet can be pasted into either place.

use crate::error::{Result, SrsError};
use crate::specialist::IterationConfig;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrsConfig {
    pub iteration: IterationConfig,
    pub model: ModelConfig,
    pub workspace: WorkspaceConfig,
}

impl SrsConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.iteration.validate()?;
        self.model.validate()?;
        self.workspace.validate()
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SrsError::config("model.base_url must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(SrsError::config("model.model must not be empty"));
        }
        if let Some(temperature) = self.temperature.filter(|t| !(0.0..=2.0).contains(t)) {
            return Err(SrsError::config(format!(
                "model.temperature must be within 0.0..=2.0, got {}",
                temperature
            )));
        }
        Ok(())
    }
}

/// Workspace conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory under the workspace root that receives deleted projects
    pub trash_dir_name: String,
    /// Prefix of Git branches that belong to a project (`SRS/<project>`)
    pub project_branch_prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            trash_dir_name: ".srs-trash".to_string(),
            project_branch_prefix: "SRS/".to_string(),
        }
    }
}

impl WorkspaceConfig {
    pub fn validate(&self) -> Result<()> {
        let name = self.trash_dir_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(SrsError::config(format!(
                "workspace.trash_dir_name must be a plain directory name, got '{}'",
                self.trash_dir_name
            )));
        }
        if self.project_branch_prefix.is_empty() {
            return Err(SrsError::config(
                "workspace.project_branch_prefix must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: SrsConfig = toml::from_str("").unwrap();
        assert_eq!(config, SrsConfig::default());
        assert_eq!(config.iteration.global_default, 10);
        assert_eq!(config.workspace.trash_dir_name, ".srs-trash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_iteration_table() {
        let config: SrsConfig = toml::from_str(
            r#"
            [iteration]
            globalDefault = 6

            [iteration.categoryDefaults]
            content = 20

            [iteration.specialistOverrides]
            fr_writer = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.iteration.global_default, 6);
        assert_eq!(config.iteration.category_defaults.content, 20);
        assert_eq!(config.iteration.category_defaults.process, 10);
        assert_eq!(config.iteration.specialist_overrides["fr_writer"], 3);
    }

    #[test]
    fn test_invalid_ratios_rejected() {
        let config: SrsConfig = toml::from_str(
            r#"
            [iteration.historyConfig.tierRatios]
            immediate = 0.5
            recent = 0.5
            milestone = 0.5
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(SrsError::Config(_))));
    }

    #[test]
    fn test_trash_dir_must_be_plain_name() {
        let config = SrsConfig {
            workspace: WorkspaceConfig {
                trash_dir_name: "../outside".to_string(),
                ..WorkspaceConfig::default()
            },
            ..SrsConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
