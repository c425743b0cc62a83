use super::AppContext;
use anyhow::{Result, bail};
use srsw_application::{ProjectBranchConvention, SessionRecoveryEngine};
use srsw_core::model::ChatOptions;
use srsw_core::specialist::SpecialistIterationManager;
use srsw_execution::{LoopOutcome, SpecialistExecutionLoop, SpecialistTask, WorkspaceFileTools};
use srsw_infrastructure::{GitCliBranchProvider, OpenAiChatModel, TokioFileSystem};
use std::sync::Arc;

/// Recovers the session for the checked-out branch, then runs one specialist.
pub async fn run(ctx: &AppContext, specialist: &str, instructions: &str) -> Result<()> {
    let recovery = SessionRecoveryEngine::new(ctx.store.clone(), Arc::new(GitCliBranchProvider::new()))
        .with_convention(ProjectBranchConvention::new(
            ctx.config.workspace.project_branch_prefix.clone(),
        ))
        .run()
        .await;
    tracing::debug!("[Run] Recovery outcome: {:?}", recovery);

    let model = OpenAiChatModel::from_config(&ctx.config.model)?;
    let specialist_loop = SpecialistExecutionLoop::new(
        Arc::new(model),
        Arc::new(WorkspaceFileTools::new(Arc::new(TokioFileSystem::new()))),
        Arc::new(SpecialistIterationManager::new(ctx.config.iteration.clone())),
        ctx.store.clone(),
    )
    .with_options(ChatOptions {
        max_tokens: ctx.config.model.max_tokens,
        temperature: ctx.config.model.temperature,
    });

    let report = specialist_loop
        .run(&SpecialistTask::new(specialist, instructions))
        .await;

    println!("Working directory: {}", report.working_dir.display());
    println!(
        "Iterations: {}/{} ({})",
        report.iterations, report.limit.max_iterations, report.limit.source
    );
    match report.outcome {
        LoopOutcome::Completed { summary } => {
            println!("Completed: {}", summary);
            Ok(())
        }
        LoopOutcome::IterationLimitReached => {
            println!("Stopped: iteration limit reached before taskComplete");
            Ok(())
        }
        LoopOutcome::Failed(e) => bail!("{} failed: {}", specialist, e),
    }
}
