//! Startup session recovery.
//!
//! Reconciles the intentional-exit flag, the checked-out Git branch and the
//! on-disk session file of the branch's project into the one session the
//! [`SessionStateStore`] owns afterwards.
//!
//! ```text
//! CheckExitFlag ──fresh flag──────────────────────────────► Done(Skipped)
//!      │
//!      ▼
//! DetectBranch ──no workspace / git failure───────────────► Done
//!      │
//!      ▼
//! Classify ──not SRS/<project>──► adopt main session ─────► Done
//!      │
//!      ▼
//! RestoreOrCreate ──valid file──► Restored ───────────────► Done
//!                 └─missing or corrupt──► Created ────────► Done
//! ```

use super::branch::ProjectBranchConvention;
use super::state_store::SessionStateStore;
use serde_json::json;
use srsw_core::error::Result;
use srsw_core::git::GitBranchProvider;
use srsw_core::session::{OperationLogEntry, OperationType, SessionContext, validate_project_name};
use std::sync::Arc;

/// How long an intentional-exit flag suppresses recovery, in milliseconds.
pub const EXIT_FLAG_WINDOW_MS: i64 = 60_000;

/// Result of one recovery run.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// A fresh intentional-exit flag was found and consumed.
    Skipped { reason: String },
    /// The workspace directory does not exist.
    NoWorkspace,
    /// The Git branch could not be determined.
    BranchUnavailable,
    /// The branch is not a project branch; the main session (if any) was adopted.
    MainSession(Option<SessionContext>),
    /// The project's session file was adopted.
    Restored(SessionContext),
    /// The project's session file was missing or unusable and a new one was started.
    Created(SessionContext),
    /// Recovery hit an error and left no session active.
    Failed(String),
}

impl RecoveryOutcome {
    /// The session that is current after recovery.
    pub fn session(&self) -> Option<&SessionContext> {
        match self {
            Self::MainSession(session) => session.as_ref(),
            Self::Restored(session) | Self::Created(session) => Some(session),
            _ => None,
        }
    }
}

enum RecoveryState {
    CheckExitFlag,
    DetectBranch,
    Classify(String),
    RestoreOrCreate { project: String, branch: String },
    Done(RecoveryOutcome),
}

/// One-shot state machine run before any specialist work starts.
pub struct SessionRecoveryEngine {
    store: Arc<SessionStateStore>,
    git: Arc<dyn GitBranchProvider>,
    convention: ProjectBranchConvention,
    exit_flag_window_ms: i64,
}

impl SessionRecoveryEngine {
    pub fn new(store: Arc<SessionStateStore>, git: Arc<dyn GitBranchProvider>) -> Self {
        Self {
            store,
            git,
            convention: ProjectBranchConvention::default(),
            exit_flag_window_ms: EXIT_FLAG_WINDOW_MS,
        }
    }

    pub fn with_convention(mut self, convention: ProjectBranchConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Runs recovery against the current wall clock.
    ///
    /// Never fails: any error is logged and degrades to "no active session".
    pub async fn run(&self) -> RecoveryOutcome {
        self.run_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// Runs recovery as if the current time were `now_ms` (Unix milliseconds).
    pub async fn run_at(&self, now_ms: i64) -> RecoveryOutcome {
        match self.drive(now_ms).await {
            Ok(outcome) => {
                tracing::debug!("[Recovery] Finished: {:?}", outcome);
                outcome
            }
            Err(e) => {
                tracing::error!("[Recovery] Recovery failed, continuing without a session: {}", e);
                self.store.adopt_session(None).await;
                RecoveryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn drive(&self, now_ms: i64) -> Result<RecoveryOutcome> {
        let mut state = RecoveryState::CheckExitFlag;
        loop {
            state = match state {
                RecoveryState::CheckExitFlag => self.check_exit_flag(now_ms).await,
                RecoveryState::DetectBranch => self.detect_branch().await,
                RecoveryState::Classify(branch) => self.classify(branch).await,
                RecoveryState::RestoreOrCreate { project, branch } => {
                    self.restore_or_create(&project, &branch).await?
                }
                RecoveryState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    // ============================================================================
    // States
    // ============================================================================

    async fn check_exit_flag(&self, now_ms: i64) -> RecoveryState {
        let Some(flag) = self.store.exit_flag().read().await else {
            return RecoveryState::DetectBranch;
        };

        if let Err(e) = self.store.exit_flag().clear().await {
            tracing::warn!("[Recovery] Failed to clear exit flag: {}", e);
        }

        if flag.age_ms(now_ms) < self.exit_flag_window_ms {
            tracing::info!(
                "[Recovery] Intentional exit {}ms ago ({}), skipping recovery",
                flag.age_ms(now_ms),
                flag.reason
            );
            return RecoveryState::Done(RecoveryOutcome::Skipped {
                reason: flag.reason,
            });
        }

        tracing::info!("[Recovery] expired flag cleared");
        RecoveryState::DetectBranch
    }

    async fn detect_branch(&self) -> RecoveryState {
        let root = self.store.workspace_root();
        if !self.store.repository().file_system().is_dir(root).await {
            tracing::info!("[Recovery] No workspace at {}, nothing to recover", root.display());
            return RecoveryState::Done(RecoveryOutcome::NoWorkspace);
        }

        match self.git.current_branch(root).await {
            Ok(branch) => RecoveryState::Classify(branch),
            Err(e) => {
                tracing::warn!("[Recovery] Could not determine Git branch: {}", e);
                RecoveryState::Done(RecoveryOutcome::BranchUnavailable)
            }
        }
    }

    async fn classify(&self, branch: String) -> RecoveryState {
        let project = self
            .convention
            .project_from_branch(&branch)
            .map(str::to_string)
            .filter(|project| match validate_project_name(project) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("[Recovery] Branch '{}' names an invalid project: {}", branch, e);
                    false
                }
            });

        match project {
            Some(project) => RecoveryState::RestoreOrCreate { project, branch },
            None => {
                let main = self.store.load_main_session().await;
                tracing::info!(
                    "[Recovery] Branch '{}' is not a project branch, main session {}",
                    branch,
                    if main.is_some() { "adopted" } else { "absent" }
                );
                self.store.adopt_session(main.clone()).await;
                RecoveryState::Done(RecoveryOutcome::MainSession(main))
            }
        }
    }

    async fn restore_or_create(&self, project: &str, branch: &str) -> Result<RecoveryState> {
        let existing = match self.store.repository().load(Some(project)).await {
            Ok(loaded) => match loaded.file.valid_session() {
                Ok(session) => Some(session.clone()),
                Err(e) => {
                    tracing::warn!("[Recovery] Session file for '{}' is unusable: {}", project, e);
                    None
                }
            },
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!("[Recovery] Session file for '{}' is unusable: {}", project, e);
                None
            }
        };

        let outcome = match existing {
            Some(session) => {
                self.store.adopt_session(Some(session.clone())).await;
                tracing::info!("[Recovery] restored session for project '{}'", project);
                RecoveryOutcome::Restored(session)
            }
            None => {
                let session = self.store.recreate_project_session(project).await?;
                tracing::info!(
                    "[Recovery] created new session for existing project '{}'",
                    project
                );
                RecoveryOutcome::Created(session)
            }
        };

        let mode = match outcome {
            RecoveryOutcome::Restored(_) => "restored",
            _ => "created",
        };
        let entry = OperationLogEntry::new(
            OperationType::SessionRecovered,
            "",
            format!("Recovered project '{}' from branch '{}'", project, branch),
            true,
        )
        .with_details(json!({ "branch": branch, "mode": mode }));
        if let Err(e) = self.store.log_operation(entry).await {
            tracing::warn!("[Recovery] Failed to log recovery for '{}': {}", project, e);
        }

        Ok(RecoveryState::Done(outcome))
    }
}
