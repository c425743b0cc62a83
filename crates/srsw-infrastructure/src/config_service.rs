//! Configuration service implementation.
//!
//! Lookup order, first existing file wins:
//!
//! 1. the explicit path given on the command line
//! 2. `<workspace>/.srs-writer.toml`
//! 3. `<config_dir>/srs-writer/config.toml`
//! 4. built-in defaults

use crate::paths::SrsPaths;
use srsw_core::config::SrsConfig;
use srsw_core::error::{Result, SrsError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Loads and caches the SRS Writer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    explicit_path: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    config: Arc<RwLock<Option<SrsConfig>>>,
}

impl ConfigService {
    /// Creates a service that looks for a workspace config under `workspace_root`.
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        Self {
            explicit_path: None,
            workspace_root,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Uses `path` ahead of every other location. Unlike the implicit
    /// locations, an explicit path that does not exist is an error.
    pub fn with_explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Candidate files in lookup order.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.explicit_path {
            candidates.push(path.clone());
        }
        if let Some(root) = &self.workspace_root {
            candidates.push(SrsPaths::workspace_config_file(root));
        }
        if let Ok(path) = SrsPaths::config_file() {
            candidates.push(path);
        }
        candidates
    }

    /// Returns the configuration file that would be used, if any.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Config` if an explicit path was given and is missing.
    pub fn resolve_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = self.explicit_path.as_ref().filter(|path| !path.is_file()) {
            return Err(SrsError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Ok(self.candidate_paths().into_iter().find(|path| path.is_file()))
    }

    /// Gets the configuration, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Config` when the selected file is unreadable,
    /// malformed or fails validation.
    pub fn get_config(&self) -> Result<SrsConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn load(&self) -> Result<SrsConfig> {
        match self.resolve_path()? {
            Some(path) => {
                let config = Self::load_file(&path)?;
                tracing::info!("[ConfigService] Loaded config from {}", path.display());
                Ok(config)
            }
            None => {
                tracing::debug!("[ConfigService] No config file found, using defaults");
                Ok(SrsConfig::default())
            }
        }
    }

    /// Parses and validates a single TOML file.
    pub fn load_file(path: &Path) -> Result<SrsConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SrsError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: SrsConfig = toml::from_str(&content)
            .map_err(|e| SrsError::config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}
