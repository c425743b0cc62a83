//! The session state store.
//!
//! `SessionStateStore` owns the in-memory `SessionContext` for the process and
//! is the only component that writes unified session files. Every mutation is a
//! read-modify-write of the on-disk envelope: the existing file is loaded, the
//! new session snapshot and one operation entry are added, and the whole
//! envelope is written back. Nothing here ever rebuilds a file from the
//! in-memory session alone, so the operation log only ever grows.

use serde_json::json;
use srsw_core::error::{Result, SrsError};
use srsw_core::fs::FileSystem;
use srsw_core::session::{
    OperationLogEntry, OperationType, SessionContext, SessionPatch, UnifiedSessionFile,
    validate_project_name,
};
use srsw_infrastructure::exit_flag::ExitFlagRepository;
use srsw_infrastructure::paths::SessionPaths;
use srsw_infrastructure::session_file_repository::JsonSessionFileRepository;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Single owner of the current session for one workspace.
///
/// Construct one per process and share it behind an `Arc`. Mutations are
/// serialized internally; reads never block on file I/O.
pub struct SessionStateStore {
    fs: Arc<dyn FileSystem>,
    repository: JsonSessionFileRepository,
    exit_flag: ExitFlagRepository,
    current: RwLock<Option<SessionContext>>,
    mutation: Mutex<()>,
}

impl SessionStateStore {
    /// Creates a store with no active session.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Migration` if the session file migration chain is broken.
    pub fn new(fs: Arc<dyn FileSystem>, paths: SessionPaths) -> Result<Self> {
        let exit_flag = ExitFlagRepository::new(fs.clone(), paths.exit_flag_file());
        let repository = JsonSessionFileRepository::new(fs.clone(), paths)?;
        Ok(Self {
            fs,
            repository,
            exit_flag,
            current: RwLock::new(None),
            mutation: Mutex::new(()),
        })
    }

    pub fn repository(&self) -> &JsonSessionFileRepository {
        &self.repository
    }

    pub fn exit_flag(&self) -> &ExitFlagRepository {
        &self.exit_flag
    }

    pub fn paths(&self) -> &SessionPaths {
        self.repository.paths()
    }

    pub fn workspace_root(&self) -> &Path {
        self.paths().workspace_root()
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Returns the in-memory session. Never touches the disk.
    pub async fn get_current_session(&self) -> Option<SessionContext> {
        self.current.read().await.clone()
    }

    /// Lists the projects that have a session file.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        self.repository.list_projects().await
    }

    /// Loads the main (non-project) session, treating an absent or unusable
    /// file as "no session".
    pub async fn load_main_session(&self) -> Option<SessionContext> {
        self.repository
            .load_or_none(None)
            .await
            .and_then(|file| file.current_session)
    }

    /// Replaces the in-memory session without touching the disk.
    pub async fn adopt_session(&self, session: Option<SessionContext>) {
        tracing::debug!(
            "[SessionStateStore] Adopting session: {}",
            session.as_ref().map(SessionContext::label).unwrap_or("<none>")
        );
        *self.current.write().await = session;
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Starts a new project and makes it current.
    ///
    /// The project directory is `<workspace>/<project_name>`.
    ///
    /// # Errors
    ///
    /// - `SrsError::InvalidProjectName` when the name fails validation
    /// - `SrsError::ProjectExists` when the project already has a session file
    /// - `SrsError::Io` when the directory or file cannot be written
    pub async fn create_new_session(&self, project_name: &str) -> Result<SessionContext> {
        validate_project_name(project_name)?;
        let _guard = self.mutation.lock().await;

        if self.repository.exists(Some(project_name)).await {
            return Err(SrsError::ProjectExists(project_name.to_string()));
        }
        self.start_project_session(project_name).await
    }

    /// Starts a fresh session for a project whose file is missing or unusable.
    ///
    /// An existing file is moved aside (never deleted) before the new one is
    /// written.
    pub(crate) async fn recreate_project_session(
        &self,
        project_name: &str,
    ) -> Result<SessionContext> {
        validate_project_name(project_name)?;
        let _guard = self.mutation.lock().await;

        let path = self.repository.path_for(Some(project_name));
        if self.fs.exists(&path).await {
            let aside = path.with_file_name(format!(
                "{}.unusable-{}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                chrono::Utc::now().timestamp_millis()
            ));
            self.fs.rename(&path, &aside).await?;
            tracing::warn!(
                "[SessionStateStore] Moved unusable session file aside: {}",
                aside.display()
            );
        }
        self.start_project_session(project_name).await
    }

    async fn start_project_session(&self, project_name: &str) -> Result<SessionContext> {
        let base_dir = self.paths().project_dir(project_name);
        self.fs.create_dir_all(&base_dir).await?;

        let session = SessionContext::new(
            Some(project_name.to_string()),
            Some(base_dir.to_string_lossy().into_owned()),
        );
        let mut file = UnifiedSessionFile::new(Some(session.clone()));
        file.append(OperationLogEntry::new(
            OperationType::SessionCreated,
            &session.session_context_id,
            format!("Created session for project '{}'", project_name),
            true,
        ));
        self.repository.save(Some(project_name), &file).await?;

        *self.current.write().await = Some(session.clone());
        tracing::info!(
            "[SessionStateStore] Created session {} for project '{}'",
            session.session_context_id,
            project_name
        );
        Ok(session)
    }

    /// Merges `patch` into the current session and persists it.
    ///
    /// The on-disk file is re-read, the merged session replaces its
    /// `currentSession`, and a `SESSION_UPDATED` entry naming the changed
    /// fields is appended. The in-memory session only changes once the write
    /// succeeded.
    ///
    /// # Errors
    ///
    /// - `SrsError::Validation` when there is no current session, or the patch
    ///   changes the project name (use [`Self::rename_project`])
    /// - `SrsError::InvalidSessionFile` when the patch leaves a project without
    ///   a `baseDir`, or the existing file cannot be parsed
    /// - `SrsError::Io` when the write fails
    pub async fn update_session(&self, patch: SessionPatch) -> Result<SessionContext> {
        let _guard = self.mutation.lock().await;

        let mut next = self
            .get_current_session()
            .await
            .ok_or_else(|| SrsError::validation("No active session to update"))?;
        let project = next.project_name.clone();
        let changed = next.apply(&patch);
        if next.project_name != project {
            return Err(SrsError::validation(
                "Project name cannot be changed by an update; rename the project instead",
            ));
        }
        if next.project_name.is_some() {
            next.validate()?;
        }

        let description = if changed.is_empty() {
            "Session touched".to_string()
        } else {
            format!("Updated fields: {}", changed.join(", "))
        };
        let entry = OperationLogEntry::new(
            OperationType::SessionUpdated,
            &next.session_context_id,
            description,
            true,
        )
        .with_details(json!({ "changedFields": changed }));

        self.append_with_session(next.project_name.as_deref(), &next, entry)
            .await?;

        *self.current.write().await = Some(next.clone());
        tracing::debug!(
            "[SessionStateStore] Updated session '{}': {:?}",
            next.label(),
            changed
        );
        Ok(next)
    }

    /// Makes `target` the current project.
    ///
    /// Only the target's file is written (one `PROJECT_SWITCHED` entry); the
    /// file of the project being left is never touched.
    ///
    /// # Errors
    ///
    /// - `SrsError::SessionFileNotFound` when `target` has no session file
    /// - `SrsError::InvalidSessionFile` when its `currentSession` is null or
    ///   its `baseDir` is missing or empty
    pub async fn switch_to_project_session(&self, target: &str) -> Result<SessionContext> {
        validate_project_name(target)?;
        let _guard = self.mutation.lock().await;

        let mut file = self.repository.load(Some(target)).await?.file;
        let session = file.valid_session()?.clone();

        let from = self
            .get_current_session()
            .await
            .and_then(|current| current.project_name);
        file.append(
            OperationLogEntry::new(
                OperationType::ProjectSwitched,
                &session.session_context_id,
                format!(
                    "Switched from '{}' to '{}'",
                    from.as_deref().unwrap_or("main"),
                    target
                ),
                true,
            )
            .with_details(json!({ "from": from, "to": target })),
        );
        self.repository.save(Some(target), &file).await?;

        *self.current.write().await = Some(session.clone());
        tracing::info!("[SessionStateStore] Switched to project '{}'", target);
        Ok(session)
    }

    /// Renames a project's directory and session file.
    ///
    /// Both moves are renames, never delete-and-recreate. The project keeps its
    /// parent directory: `<ws>/group/old` becomes `<ws>/group/new`. A
    /// `PROJECT_RENAMED` entry is written to the old file before the move and a
    /// `SESSION_UPDATED` entry to the new file after it. If anything fails the
    /// in-memory session is restored.
    ///
    /// # Errors
    ///
    /// - `SrsError::InvalidProjectName` when either name fails validation
    /// - `SrsError::ProjectExists` when `new_name` is taken
    /// - `SrsError::SessionFileNotFound` / `SrsError::InvalidSessionFile` for the old project
    /// - `SrsError::PathOutsideWorkspace` when the old or new directory resolves
    ///   outside the workspace root
    /// - `SrsError::Io` when a move fails
    pub async fn rename_project(&self, old_name: &str, new_name: &str) -> Result<SessionContext> {
        validate_project_name(old_name)?;
        validate_project_name(new_name)?;
        if old_name == new_name {
            return Err(SrsError::validation(format!(
                "Project is already named '{}'",
                new_name
            )));
        }
        let _guard = self.mutation.lock().await;

        let file = self.repository.load(Some(old_name)).await?.file;
        let session = file.valid_session()?.clone();
        let old_base = PathBuf::from(session.base_dir.clone().unwrap_or_default());
        let new_base = old_base
            .parent()
            .map(|parent| parent.join(new_name))
            .unwrap_or_else(|| self.paths().project_dir(new_name));
        self.ensure_inside_workspace(&old_base).await?;
        self.ensure_inside_workspace(&new_base).await?;

        if self.repository.exists(Some(new_name)).await || self.fs.exists(&new_base).await {
            return Err(SrsError::ProjectExists(new_name.to_string()));
        }

        let previous = self.get_current_session().await;
        let renaming_current = previous
            .as_ref()
            .is_some_and(|current| current.project_name.as_deref() == Some(old_name));
        if renaming_current {
            if let Some(current) = self.current.write().await.as_mut() {
                current.project_name = Some(new_name.to_string());
            }
        }

        match self
            .rename_on_disk(old_name, new_name, file, session, &old_base, &new_base)
            .await
        {
            Ok(renamed) => {
                if renaming_current {
                    *self.current.write().await = Some(renamed.clone());
                }
                tracing::info!(
                    "[SessionStateStore] Renamed project '{}' to '{}'",
                    old_name,
                    new_name
                );
                Ok(renamed)
            }
            Err(e) => {
                if renaming_current {
                    *self.current.write().await = previous;
                }
                tracing::error!(
                    "[SessionStateStore] Rename '{}' -> '{}' failed: {}",
                    old_name,
                    new_name,
                    e
                );
                Err(e)
            }
        }
    }

    async fn rename_on_disk(
        &self,
        old_name: &str,
        new_name: &str,
        mut file: UnifiedSessionFile,
        mut session: SessionContext,
        old_base: &Path,
        new_base: &Path,
    ) -> Result<SessionContext> {
        file.append(
            OperationLogEntry::new(
                OperationType::ProjectRenamed,
                &session.session_context_id,
                format!("Renamed project '{}' to '{}'", old_name, new_name),
                true,
            )
            .with_details(json!({ "from": old_name, "to": new_name })),
        );
        self.repository.save(Some(old_name), &file).await?;

        let moved_dir = self.fs.exists(old_base).await;
        if moved_dir {
            self.fs.rename(old_base, new_base).await?;
        }

        let old_path = self.repository.path_for(Some(old_name));
        let new_path = self.repository.path_for(Some(new_name));
        if let Err(e) = self.fs.rename(&old_path, &new_path).await {
            if moved_dir {
                if let Err(undo) = self.fs.rename(new_base, old_base).await {
                    tracing::error!(
                        "[SessionStateStore] Could not move {} back after failed rename: {}",
                        new_base.display(),
                        undo
                    );
                }
            }
            return Err(e.into());
        }

        let changed = session.apply(
            &SessionPatch::new()
                .project_name(Some(new_name.to_string()))
                .base_dir(Some(new_base.to_string_lossy().into_owned())),
        );
        file.current_session = Some(session.clone());
        file.append(
            OperationLogEntry::new(
                OperationType::SessionUpdated,
                &session.session_context_id,
                format!("Updated fields: {}", changed.join(", ")),
                true,
            )
            .with_details(json!({ "changedFields": changed })),
        );
        self.repository.save(Some(new_name), &file).await?;
        Ok(session)
    }

    /// Moves the active project into the workspace trash and falls back to the
    /// main session.
    ///
    /// # Returns
    ///
    /// The session now current: the main session, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// - `SrsError::Validation` when `name` is not the active project
    /// - `SrsError::PathOutsideWorkspace` when the project directory resolves
    ///   outside the workspace root (or to the root itself)
    /// - `SrsError::Io` when a move fails
    pub async fn delete_project(&self, name: &str) -> Result<Option<SessionContext>> {
        validate_project_name(name)?;
        let _guard = self.mutation.lock().await;

        let current = self
            .get_current_session()
            .await
            .ok_or_else(|| SrsError::validation("No active project to delete"))?;
        if current.project_name.as_deref() != Some(name) {
            return Err(SrsError::validation(format!(
                "Only the active project can be deleted (active: '{}', requested: '{}')",
                current.label(),
                name
            )));
        }
        current.validate()?;
        let base_dir = PathBuf::from(current.base_dir.clone().unwrap_or_default());
        self.ensure_inside_workspace(&base_dir).await?;

        let mut file = match self.repository.read(Some(name)).await? {
            Some(loaded) => loaded.file,
            None => UnifiedSessionFile::new(Some(current.clone())),
        };
        file.append(OperationLogEntry::new(
            OperationType::ProjectDeleted,
            &current.session_context_id,
            format!("Moved project '{}' to trash", name),
            true,
        ));
        self.repository.save(Some(name), &file).await?;

        let trash_entry = self.paths().trash_dir().join(format!(
            "{}_{}",
            name,
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
        ));
        self.fs.create_dir_all(&trash_entry).await?;
        if self.fs.exists(&base_dir).await {
            self.fs.rename(&base_dir, &trash_entry.join(name)).await?;
        }
        let session_path = self.repository.path_for(Some(name));
        if let Some(file_name) = session_path.file_name() {
            self.fs.rename(&session_path, &trash_entry.join(file_name)).await?;
        }
        tracing::info!(
            "[SessionStateStore] Project '{}' moved to {}",
            name,
            trash_entry.display()
        );

        let fallback = self.load_main_session().await;
        *self.current.write().await = fallback.clone();
        Ok(fallback)
    }

    /// Appends an operation to the current project's file (the main file when
    /// no project is active).
    pub async fn log_operation(&self, mut entry: OperationLogEntry) -> Result<()> {
        let _guard = self.mutation.lock().await;

        let current = self.get_current_session().await;
        let project = current.as_ref().and_then(|s| s.project_name.clone());
        if entry.session_context_id.is_empty() {
            if let Some(session) = &current {
                entry.session_context_id = session.session_context_id.clone();
            }
        }

        let mut file = match self.repository.read(project.as_deref()).await? {
            Some(loaded) => loaded.file,
            None => UnifiedSessionFile::new(current),
        };
        file.append(entry);
        self.repository.save(project.as_deref(), &file).await
    }

    /// Drops the current session and records an intentional exit so the next
    /// startup does not restore it.
    pub async fn clear_session(&self, reason: &str) -> Result<()> {
        let _guard = self.mutation.lock().await;
        *self.current.write().await = None;
        self.exit_flag.mark_intentional_exit(reason).await
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    async fn append_with_session(
        &self,
        project: Option<&str>,
        session: &SessionContext,
        entry: OperationLogEntry,
    ) -> Result<()> {
        let mut file = match self.repository.read(project).await? {
            Some(loaded) => loaded.file,
            None => UnifiedSessionFile::new(None),
        };
        file.current_session = Some(session.clone());
        file.append(entry);
        self.repository.save(project, &file).await
    }

    /// Rejects paths that resolve to the workspace root or anywhere outside it.
    async fn ensure_inside_workspace(&self, path: &Path) -> Result<()> {
        let root = self.workspace_root();
        let lexical_root = normalize_lexically(root);
        let canonical_root = self
            .fs
            .canonicalize(root)
            .await
            .unwrap_or_else(|_| lexical_root.clone());

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let resolved = match self.fs.canonicalize(&absolute).await {
            Ok(resolved) => resolved,
            Err(_) => normalize_lexically(&absolute),
        };

        let inside = [&canonical_root, &lexical_root]
            .iter()
            .any(|root| resolved.starts_with(root) && &&resolved != root);
        if !inside {
            return Err(SrsError::PathOutsideWorkspace(path.display().to_string()));
        }
        Ok(())
    }
}

/// Resolves `.` and `..` components without touching the file system.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
