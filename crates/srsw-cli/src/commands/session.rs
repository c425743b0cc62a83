use super::AppContext;
use anyhow::{Context, Result};
use srsw_application::{ProjectBranchConvention, RecoveryOutcome, SessionRecoveryEngine};
use srsw_core::git::GitBranchProvider;
use srsw_core::session::SessionContext;
use srsw_infrastructure::GitCliBranchProvider;
use std::sync::Arc;

fn convention(ctx: &AppContext) -> ProjectBranchConvention {
    ProjectBranchConvention::new(ctx.config.workspace.project_branch_prefix.clone())
}

fn print_session(session: &SessionContext) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(session)?);
    Ok(())
}

pub async fn status(ctx: &AppContext) -> Result<()> {
    println!("Workspace: {}", ctx.workspace.display());

    match ctx.store.exit_flag().read().await {
        Some(flag) => println!("Exit flag: {} (timestamp {})", flag.reason, flag.timestamp),
        None => println!("Exit flag: none"),
    }

    let branch = match GitCliBranchProvider::new().current_branch(&ctx.workspace).await {
        Ok(branch) => branch,
        Err(e) => {
            println!("Git branch: unavailable ({})", e);
            return Ok(());
        }
    };
    println!("Git branch: {}", branch);

    let project = convention(ctx).project_from_branch(&branch).map(str::to_string);
    let loaded = ctx.store.repository().load_or_none(project.as_deref()).await;
    match (&project, loaded.and_then(|file| file.current_session)) {
        (Some(project), Some(session)) => {
            println!("Project: {}", project);
            print_session(&session)?;
        }
        (Some(project), None) => println!("Project: {} (no usable session file)", project),
        (None, Some(session)) => {
            println!("Project: none (main session)");
            print_session(&session)?;
        }
        (None, None) => println!("Project: none"),
    }
    Ok(())
}

pub async fn create(ctx: &AppContext, name: &str) -> Result<()> {
    let session = ctx.store.create_new_session(name).await?;
    println!("Created project '{}'", name);
    print_session(&session)?;
    println!(
        "Check out branch '{}' to resume it automatically",
        convention(ctx).branch_for_project(name)
    );
    Ok(())
}

pub async fn switch(ctx: &AppContext, name: &str) -> Result<()> {
    let session = ctx.store.switch_to_project_session(name).await?;
    println!("Switched to project '{}'", name);
    print_session(&session)?;
    Ok(())
}

pub async fn rename(ctx: &AppContext, old: &str, new: &str) -> Result<()> {
    let session = ctx.store.rename_project(old, new).await?;
    println!("Renamed project '{}' to '{}'", old, new);
    print_session(&session)?;
    Ok(())
}

pub async fn delete(ctx: &AppContext, name: &str) -> Result<()> {
    let loaded = ctx
        .store
        .repository()
        .load(Some(name))
        .await
        .with_context(|| format!("Cannot delete project '{}'", name))?;
    ctx.store.adopt_session(loaded.file.current_session).await;

    let fallback = ctx.store.delete_project(name).await?;
    println!(
        "Moved project '{}' to {}",
        name,
        ctx.store.paths().trash_dir().display()
    );
    match fallback {
        Some(session) => println!("Now on main session {}", session.session_context_id),
        None => println!("No active session"),
    }
    Ok(())
}

pub async fn recover(ctx: &AppContext) -> Result<()> {
    let engine = SessionRecoveryEngine::new(ctx.store.clone(), Arc::new(GitCliBranchProvider::new()))
        .with_convention(convention(ctx));

    match engine.run().await {
        RecoveryOutcome::Skipped { reason } => {
            println!("Recovery skipped: intentional exit ({})", reason)
        }
        RecoveryOutcome::NoWorkspace => println!("No workspace at {}", ctx.workspace.display()),
        RecoveryOutcome::BranchUnavailable => println!("Git branch unavailable, no session"),
        RecoveryOutcome::MainSession(None) => println!("Not on a project branch, no session"),
        RecoveryOutcome::MainSession(Some(session)) => {
            println!("Not on a project branch, main session adopted");
            print_session(&session)?;
        }
        RecoveryOutcome::Restored(session) => {
            println!("Restored project '{}'", session.label());
            print_session(&session)?;
        }
        RecoveryOutcome::Created(session) => {
            println!("Created new session for project '{}'", session.label());
            print_session(&session)?;
        }
        RecoveryOutcome::Failed(message) => println!("Recovery failed: {}", message),
    }
    Ok(())
}

pub async fn list(ctx: &AppContext) -> Result<()> {
    let projects = ctx.store.list_projects().await?;
    if projects.is_empty() {
        println!("No projects");
    }
    for project in projects {
        println!("{}", project);
    }
    Ok(())
}

pub async fn exit(ctx: &AppContext, reason: &str) -> Result<()> {
    ctx.store.clear_session(reason).await?;
    println!("Session cleared; recovery is suppressed for the next minute");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_rename_delete_flow() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);

        create(&ctx, "alpha").await.unwrap();
        rename(&ctx, "alpha", "beta").await.unwrap();
        assert_eq!(ctx.store.list_projects().await.unwrap(), vec!["beta"]);

        // A fresh process has no in-memory session; delete adopts the file first
        let ctx = context(&temp_dir);
        delete(&ctx, "beta").await.unwrap();
        assert!(ctx.store.list_projects().await.unwrap().is_empty());
        assert!(!temp_dir.path().join("beta").exists());
    }

    #[tokio::test]
    async fn test_delete_unknown_project_fails() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        assert!(delete(&ctx, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_exit_writes_flag() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        exit(&ctx, "done for today").await.unwrap();
        assert_eq!(
            ctx.store.exit_flag().read().await.unwrap().reason,
            "done for today"
        );
    }
}
