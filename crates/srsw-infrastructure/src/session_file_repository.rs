//! JSON persistence for unified session files.
//!
//! One file per project under `<workspace>/.session-log/`. Every load goes
//! through the same pipeline:
//!
//! 1. read raw text (a missing file is `None`, not an error)
//! 2. parse as untyped JSON and detect the format version
//! 3. migrate older formats to the current envelope in memory
//! 4. deserialize into `UnifiedSessionFile`
//!
//! Migrated files are not written back here; the next save persists the
//! current format.

use crate::migration::{
    LATEST_FILE_VERSION, MigrationChain, MigrationRegistry, detect_file_version,
    session_file_migrations,
};
use crate::paths::SessionPaths;
use semver::Version;
use serde_json::Value;
use srsw_core::error::{Result, SrsError};
use srsw_core::fs::FileSystem;
use srsw_core::session::UnifiedSessionFile;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// A session file as read from disk, with its pre-migration version.
#[derive(Debug, Clone)]
pub struct LoadedSessionFile {
    pub file: UnifiedSessionFile,
    pub source_version: Version,
}

impl LoadedSessionFile {
    /// Returns true if the file was upgraded in memory while loading.
    pub fn was_migrated(&self) -> bool {
        self.source_version < LATEST_FILE_VERSION
    }
}

/// Repository for unified session files.
#[derive(Clone)]
pub struct JsonSessionFileRepository {
    fs: Arc<dyn FileSystem>,
    paths: SessionPaths,
    migrations: Arc<MigrationRegistry<Value>>,
}

impl JsonSessionFileRepository {
    /// Creates a repository over `paths`.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Migration` if the built-in migration chain is broken.
    pub fn new(fs: Arc<dyn FileSystem>, paths: SessionPaths) -> Result<Self> {
        let migrations = session_file_migrations().map_err(|e| SrsError::migration(e.to_string()))?;
        Ok(Self {
            fs,
            paths,
            migrations: Arc::new(migrations),
        })
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Path of a project's session file (`None` for the main session).
    pub fn path_for(&self, project: Option<&str>) -> PathBuf {
        self.paths.session_file(project)
    }

    pub async fn exists(&self, project: Option<&str>) -> bool {
        self.fs.exists(&self.path_for(project)).await
    }

    /// Reads and migrates a session file without validating its session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: the file exists and parsed
    /// - `Ok(None)`: the file does not exist
    ///
    /// # Errors
    ///
    /// - `SrsError::Io` when the file exists but cannot be read
    /// - `SrsError::InvalidSessionFile` when the content is empty, not JSON, or
    ///   not a recognizable session document
    pub async fn read(&self, project: Option<&str>) -> Result<Option<LoadedSessionFile>> {
        let path = self.path_for(project);
        let content = match self.fs.read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Err(SrsError::invalid_session_file(format!(
                "{} is empty",
                path.display()
            )));
        }

        let document: Value = serde_json::from_str(&content).map_err(|e| {
            SrsError::invalid_session_file(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        let source_version = detect_file_version(&document)
            .map_err(|e| SrsError::invalid_session_file(format!("{}: {}", path.display(), e)))?;

        let document = if source_version > LATEST_FILE_VERSION {
            tracing::warn!(
                "[SessionFileRepository] {} has fileVersion {} (newer than {}), loading as-is",
                path.display(),
                source_version,
                LATEST_FILE_VERSION
            );
            document
        } else {
            self.migrations
                .migrate_to_latest(document, &source_version)
                .map_err(|e| SrsError::migration(format!("{}: {:#}", path.display(), e)))?
        };

        let file: UnifiedSessionFile = serde_json::from_value(document).map_err(|e| {
            SrsError::invalid_session_file(format!("{}: {}", path.display(), e))
        })?;

        let loaded = LoadedSessionFile {
            file,
            source_version,
        };
        if loaded.was_migrated() {
            tracing::info!(
                "[SessionFileRepository] Converted {} from format {} to {}",
                path.display(),
                loaded.source_version,
                LATEST_FILE_VERSION
            );
        }
        Ok(Some(loaded))
    }

    /// Loads a session file that must exist and hold an adoptable envelope.
    ///
    /// # Errors
    ///
    /// - `SrsError::SessionFileNotFound` when the file does not exist
    /// - `SrsError::InvalidSessionFile` ("baseDir is missing or empty") when the
    ///   current session has no usable directory
    /// - everything `read` can return
    pub async fn load(&self, project: Option<&str>) -> Result<LoadedSessionFile> {
        let loaded = self.read(project).await?.ok_or_else(|| SrsError::SessionFileNotFound {
            project: project.unwrap_or("main").to_string(),
            path: self.path_for(project).display().to_string(),
        })?;
        loaded.file.validate()?;
        Ok(loaded)
    }

    /// Like `load`, but treats every failure as "no file", logging why.
    pub async fn load_or_none(&self, project: Option<&str>) -> Option<UnifiedSessionFile> {
        match self.load(project).await {
            Ok(loaded) => Some(loaded.file),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(
                    "[SessionFileRepository] Ignoring unusable session file for '{}': {}",
                    project.unwrap_or("main"),
                    e
                );
                None
            }
        }
    }

    /// Writes the full envelope atomically.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Serialization` or `SrsError::Io`; write failures are
    /// always propagated.
    pub async fn save(&self, project: Option<&str>, file: &UnifiedSessionFile) -> Result<()> {
        let path = self.path_for(project);
        let mut json = serde_json::to_string_pretty(file)?;
        json.push('\n');

        self.fs.create_dir_all(&self.paths.session_log_dir()).await?;
        self.fs.write(&path, &json).await?;

        tracing::debug!(
            "[SessionFileRepository] Saved {} ({} operations)",
            path.display(),
            file.operations.len()
        );
        Ok(())
    }

    /// Lists the projects that have a session file, sorted by name.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let dir = self.paths.session_log_dir();
        let names = match self.fs.read_dir_names(&dir).await {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut projects: Vec<String> = names
            .iter()
            .filter_map(|name| SessionPaths::project_from_file_name(name))
            .map(str::to_string)
            .collect();
        projects.sort();
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TokioFileSystem;
    use srsw_core::session::{OperationLogEntry, OperationType, SessionContext};
    use tempfile::TempDir;

    fn repository(temp_dir: &TempDir) -> JsonSessionFileRepository {
        JsonSessionFileRepository::new(
            Arc::new(TokioFileSystem::new()),
            SessionPaths::new(temp_dir.path(), ".srs-trash"),
        )
        .unwrap()
    }

    async fn write_raw(repo: &JsonSessionFileRepository, project: &str, content: &str) {
        let path = repo.path_for(Some(project));
        repo.file_system().write(&path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);

        let session = SessionContext::new(Some("alpha".into()), Some("/ws/alpha".into()));
        let mut file = UnifiedSessionFile::new(Some(session.clone()));
        file.append(OperationLogEntry::new(
            OperationType::SessionCreated,
            &session.session_context_id,
            "created",
            true,
        ));
        repo.save(Some("alpha"), &file).await.unwrap();

        let loaded = repo.load(Some("alpha")).await.unwrap();
        assert!(!loaded.was_migrated());
        assert_eq!(loaded.file, file);

        let raw = repo
            .file_system()
            .read_to_string(&repo.path_for(Some("alpha")))
            .await
            .unwrap();
        let file_version_at = raw.find("fileVersion").unwrap();
        let operations_at = raw.find("\"operations\"").unwrap();
        assert!(file_version_at < operations_at);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);

        assert!(repo.read(Some("ghost")).await.unwrap().is_none());
        let err = repo.load(Some("ghost")).await.unwrap_err();
        assert!(matches!(err, SrsError::SessionFileNotFound { .. }));
        assert!(repo.load_or_none(Some("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_base_dir_rejected_in_every_shape() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);

        let variants = [
            r#""baseDir": "","#,
            r#""baseDir": null,"#,
            "",
        ];
        for variant in variants {
            let content = format!(
                r#"{{
                    "fileVersion": "5.0",
                    "currentSession": {{
                        "sessionContextId": "s",
                        "projectName": "p",
                        {}
                        "activeFiles": []
                    }},
                    "operations": [],
                    "timeRange": {{ "startDate": "a", "endDate": "b" }},
                    "createdAt": "a",
                    "lastUpdated": "b"
                }}"#,
                variant
            );
            write_raw(&repo, "p", &content).await;

            let err = repo.load(Some("p")).await.unwrap_err();
            assert!(
                err.to_string().contains("baseDir is missing or empty"),
                "unexpected error: {}",
                err
            );
            // read() alone does not judge the session
            assert!(repo.read(Some("p")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_corrupt_json_is_invalid_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        write_raw(&repo, "broken", "{ not json").await;

        let err = repo.read(Some("broken")).await.unwrap_err();
        assert!(matches!(err, SrsError::InvalidSessionFile(_)));
        assert!(repo.load_or_none(Some("broken")).await.is_none());
    }

    #[tokio::test]
    async fn test_legacy_file_is_migrated_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        write_raw(
            &repo,
            "old",
            r#"{ "sessionContextId": "legacy", "projectName": "old", "baseDir": "/ws/old" }"#,
        )
        .await;

        let loaded = repo.load(Some("old")).await.unwrap();
        assert!(loaded.was_migrated());
        assert_eq!(loaded.source_version, Version::new(0, 0, 0));
        assert_eq!(loaded.file.file_version, "5.0");
        assert_eq!(
            loaded.file.operations[0].operation_type,
            OperationType::FormatMigrated
        );
    }

    #[tokio::test]
    async fn test_list_projects_skips_main_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repository(&temp_dir);
        assert!(repo.list_projects().await.unwrap().is_empty());

        let file = UnifiedSessionFile::new(None);
        repo.save(Some("beta"), &file).await.unwrap();
        repo.save(Some("alpha"), &file).await.unwrap();
        repo.save(None, &file).await.unwrap();
        write_raw(&repo, "x", "{}").await;
        repo.file_system()
            .write(&repo.paths().exit_flag_file(), "{}")
            .await
            .unwrap();

        assert_eq!(repo.list_projects().await.unwrap(), vec!["alpha", "beta", "x"]);
    }
}
