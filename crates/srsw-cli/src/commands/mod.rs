pub mod compress;
pub mod iterations;
pub mod run;
pub mod session;

use anyhow::{Context, Result};
use srsw_application::SessionStateStore;
use srsw_core::config::SrsConfig;
use srsw_infrastructure::{ConfigService, SessionPaths, TokioFileSystem};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs: the workspace, its configuration and the
/// session store built on top of them.
pub struct AppContext {
    pub workspace: PathBuf,
    pub config: SrsConfig,
    pub store: Arc<SessionStateStore>,
}

impl AppContext {
    pub fn load(workspace: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let workspace = match workspace {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };

        let mut service = ConfigService::new(Some(workspace.clone()));
        if let Some(path) = config_path {
            service = service.with_explicit_path(path);
        }
        let config = service.get_config()?;

        let paths = SessionPaths::new(&workspace, config.workspace.trash_dir_name.clone());
        let store = Arc::new(SessionStateStore::new(
            Arc::new(TokioFileSystem::new()),
            paths,
        )?);

        Ok(Self {
            workspace,
            config,
            store,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub fn context(temp_dir: &TempDir) -> AppContext {
        AppContext::load(Some(temp_dir.path().to_path_buf()), None).unwrap()
    }
}
