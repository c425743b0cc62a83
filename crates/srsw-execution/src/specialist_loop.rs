//! The specialist execution loop.
//!
//! One run drives a single specialist through repeated
//! prompt → model → tools rounds until it calls `taskComplete`, the model
//! fails for good, or the iteration budget is spent. Iterations are strictly
//! sequential: history for round N+1 is compressed only after round N's tool
//! results are in.

use crate::reply::parse_reply;
use crate::tool::{ToolCall, ToolExecutor};
use serde_json::{Value, json};
use srsw_application::SessionStateStore;
use srsw_core::error::SrsError;
use srsw_core::history::{HistoryCompressor, TOOL_RESULT_MARKER};
use srsw_core::model::{
    ChatMessage, ChatModel, ChatOptions, ErrorClassifier, NetworkErrorClassifier, with_retry,
};
use srsw_core::session::{OperationLogEntry, OperationType};
use srsw_core::specialist::{IterationLimit, SpecialistIterationManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Name of the tool that ends a specialist run successfully.
pub const TASK_COMPLETE_TOOL: &str = "taskComplete";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an SRS Writer specialist. Reply with a single JSON object \
{\"content\": string, \"tool_calls\": [{\"name\": string, \"args\": object}]}. \
Call the taskComplete tool with a \"summary\" argument when the task is finished.";

const NO_TOOL_NUDGE: &str =
    "本轮没有调用任何工具。请调用工具继续推进任务，完成后调用 taskComplete。";

/// One unit of work for a specialist.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialistTask {
    pub specialist_id: String,
    pub instructions: String,
    pub system_prompt: Option<String>,
}

impl SpecialistTask {
    pub fn new(specialist_id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            specialist_id: specialist_id.into(),
            instructions: instructions.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// How a specialist run ended.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The specialist called `taskComplete`.
    Completed { summary: String },
    /// The budget ran out before `taskComplete`.
    IterationLimitReached,
    /// The model could not be reached or rejected the request.
    Failed(SrsError),
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::IterationLimitReached => "iteration_limit_reached",
            Self::Failed(_) => "failed",
        }
    }
}

/// Everything a caller needs after a run.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub specialist_id: String,
    pub outcome: LoopOutcome,
    pub iterations: u32,
    pub limit: IterationLimit,
    pub working_dir: PathBuf,
    /// Uncompressed history, oldest first
    pub history: Vec<String>,
    pub execution_time_ms: u64,
}

/// Runs specialists against a chat model and a tool executor.
pub struct SpecialistExecutionLoop {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolExecutor>,
    iterations: Arc<SpecialistIterationManager>,
    store: Arc<SessionStateStore>,
    classifier: Arc<dyn ErrorClassifier>,
    options: ChatOptions,
}

impl SpecialistExecutionLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<dyn ToolExecutor>,
        iterations: Arc<SpecialistIterationManager>,
        store: Arc<SessionStateStore>,
    ) -> Self {
        Self {
            model,
            tools,
            iterations,
            store,
            classifier: Arc::new(NetworkErrorClassifier),
            options: ChatOptions::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one specialist task to completion.
    ///
    /// Never returns an error: model failures end the run with
    /// [`LoopOutcome::Failed`], tool failures are fed back to the model, and a
    /// failure to record the run in the session log is only logged.
    pub async fn run(&self, task: &SpecialistTask) -> LoopReport {
        let started = Instant::now();
        let limit = self.iterations.resolve(&task.specialist_id);
        let compressor = HistoryCompressor::new(self.iterations.history_config());
        let working_dir = self.resolve_working_dir().await;

        tracing::info!(
            specialist_id = %task.specialist_id,
            max_iterations = limit.max_iterations,
            source = %limit.source,
            "[SpecialistLoop] Starting in {}",
            working_dir.display()
        );

        let mut history: Vec<String> = Vec::new();
        let mut outcome = LoopOutcome::IterationLimitReached;
        let mut iteration = 0;

        while iteration < limit.max_iterations {
            iteration += 1;
            tracing::debug!(
                specialist_id = %task.specialist_id,
                iteration,
                "[SpecialistLoop] Iteration started"
            );

            let compressed = compressor.compress(&history, iteration);
            let messages = self.build_messages(task, &working_dir, &compressed, iteration, &limit);

            let reply_text = match with_retry(
                || self.model.send(&messages, &self.options),
                self.classifier.as_ref(),
            )
            .await
            {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(
                        specialist_id = %task.specialist_id,
                        iteration,
                        "[SpecialistLoop] Model invocation failed: {}",
                        e
                    );
                    outcome = LoopOutcome::Failed(e);
                    break;
                }
            };

            let reply = parse_reply(&reply_text);
            history.push(format!("迭代 {} - AI计划:\n{}", iteration, reply.describe()));

            if reply.tool_calls.is_empty() {
                tracing::debug!(
                    specialist_id = %task.specialist_id,
                    iteration,
                    "[SpecialistLoop] No tool calls, nudging"
                );
                history.push(format!("迭代 {} - 工具结果:\n{}", iteration, NO_TOOL_NUDGE));
                continue;
            }

            let mut results = Vec::new();
            let mut summary = None;
            for call in &reply.tool_calls {
                if call.name == TASK_COMPLETE_TOOL {
                    summary = Some(
                        call.arg_str("summary")
                            .map(str::to_string)
                            .or_else(|| reply.content.clone())
                            .unwrap_or_default(),
                    );
                    break;
                }
                results.push(self.execute_tool(task, call, &working_dir, iteration).await);
            }

            if !results.is_empty() {
                history.push(format!("迭代 {} - 工具结果:\n{}", iteration, results.join("\n")));
            }
            if let Some(summary) = summary {
                outcome = LoopOutcome::Completed { summary };
                break;
            }
        }

        if matches!(outcome, LoopOutcome::IterationLimitReached) {
            tracing::warn!(
                specialist_id = %task.specialist_id,
                iterations = iteration,
                "[SpecialistLoop] Iteration limit reached ({})",
                limit.source
            );
        }

        let report = LoopReport {
            specialist_id: task.specialist_id.clone(),
            outcome,
            iterations: iteration,
            limit,
            working_dir,
            history,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        self.record_invocation(&report).await;

        tracing::info!(
            specialist_id = %report.specialist_id,
            iterations = report.iterations,
            outcome = report.outcome.label(),
            "[SpecialistLoop] Finished"
        );
        report
    }

    /// The active project's directory, or the workspace root without one.
    async fn resolve_working_dir(&self) -> PathBuf {
        self.store
            .get_current_session()
            .await
            .filter(|session| session.has_base_dir())
            .and_then(|session| session.base_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.store.workspace_root().to_path_buf())
    }

    fn build_messages(
        &self,
        task: &SpecialistTask,
        working_dir: &Path,
        history: &[String],
        iteration: u32,
        limit: &IterationLimit,
    ) -> Vec<ChatMessage> {
        let system = task
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let mut prompt = format!(
            "## 任务\n{}\n\n## 工作目录\n{}\n\n## 当前迭代\n{}/{}",
            task.instructions,
            working_dir.display(),
            iteration,
            limit.max_iterations
        );
        if !history.is_empty() {
            prompt.push_str("\n\n## 历史记录\n");
            prompt.push_str(&history.join("\n\n"));
        }

        vec![ChatMessage::system(system), ChatMessage::user(prompt)]
    }

    async fn execute_tool(
        &self,
        task: &SpecialistTask,
        call: &ToolCall,
        working_dir: &Path,
        iteration: u32,
    ) -> String {
        let started = Instant::now();
        match self.tools.execute(call, working_dir).await {
            Ok(output) => format!("{} - {}: 成功\n{}", TOOL_RESULT_MARKER, call.name, render(&output)),
            Err(e) => {
                tracing::warn!(
                    specialist_id = %task.specialist_id,
                    tool = %call.name,
                    iteration,
                    "[SpecialistLoop] Tool failed: {}",
                    e
                );
                let entry = OperationLogEntry::new(
                    OperationType::ToolExecutionFailed,
                    "",
                    format!("{} failed in iteration {}", call.name, iteration),
                    false,
                )
                .with_specialist(&task.specialist_id)
                .with_tool(&call.name)
                .with_execution_time(started.elapsed().as_millis() as u64)
                .with_error(e.to_string());
                if let Err(log_err) = self.store.log_operation(entry).await {
                    tracing::warn!("[SpecialistLoop] Could not log tool failure: {}", log_err);
                }
                format!("{} - {}: 失败 - {}", TOOL_RESULT_MARKER, call.name, e)
            }
        }
    }

    async fn record_invocation(&self, report: &LoopReport) {
        let mut entry = OperationLogEntry::new(
            OperationType::SpecialistInvoked,
            "",
            format!(
                "{} {} after {} iteration(s)",
                report.specialist_id,
                report.outcome.label(),
                report.iterations
            ),
            report.outcome.is_success(),
        )
        .with_specialist(&report.specialist_id)
        .with_execution_time(report.execution_time_ms)
        .with_details(json!({
            "iterations": report.iterations,
            "maxIterations": report.limit.max_iterations,
            "limitSource": report.limit.source,
            "outcome": report.outcome.label(),
        }));
        if let LoopOutcome::Failed(e) = &report.outcome {
            entry = entry.with_error(e.to_string());
        }

        if let Err(e) = self.store.log_operation(entry).await {
            tracing::warn!(
                specialist_id = %report.specialist_id,
                "[SpecialistLoop] Could not log specialist invocation: {}",
                e
            );
        }
    }
}

fn render(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use srsw_core::error::Result;
    use srsw_core::model::ModelError;
    use srsw_core::session::UnifiedSessionFile;
    use srsw_core::specialist::IterationConfig;
    use srsw_infrastructure::fs::TokioFileSystem;
    use srsw_infrastructure::paths::SessionPaths;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned replies; repeats the last one once the script runs out.
    struct ScriptedChatModel {
        script: Mutex<VecDeque<std::result::Result<String, ModelError>>>,
        last: Mutex<Option<std::result::Result<String, ModelError>>>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChatModel {
        fn new(script: Vec<std::result::Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn replies(replies: &[&str]) -> Arc<Self> {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn user_prompt(&self, call: usize) -> String {
            self.prompts.lock().unwrap()[call][1].content.clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn send(
            &self,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> std::result::Result<String, ModelError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(reply) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    reply
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Err(ModelError::new("script is empty"))),
            }
        }
    }

    #[derive(Default)]
    struct MockToolExecutor {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, PathBuf)>>,
    }

    #[async_trait]
    impl ToolExecutor for MockToolExecutor {
        async fn execute(&self, call: &ToolCall, working_dir: &Path) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((call.name.clone(), working_dir.to_path_buf()));
            if self.failing.contains(&call.name.as_str()) {
                return Err(SrsError::validation(format!("{} exploded", call.name)));
            }
            Ok(json!(format!("{} ok", call.name)))
        }
    }

    struct Harness {
        temp_dir: TempDir,
        store: Arc<SessionStateStore>,
        tools: Arc<MockToolExecutor>,
    }

    async fn harness(tools: MockToolExecutor, project: Option<&str>) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            SessionStateStore::new(
                Arc::new(TokioFileSystem::new()),
                SessionPaths::new(temp_dir.path(), ".srs-trash"),
            )
            .unwrap(),
        );
        if let Some(project) = project {
            store.create_new_session(project).await.unwrap();
        }
        Harness {
            temp_dir,
            store,
            tools: Arc::new(tools),
        }
    }

    fn looped(
        harness: &Harness,
        model: Arc<ScriptedChatModel>,
        config: IterationConfig,
    ) -> SpecialistExecutionLoop {
        SpecialistExecutionLoop::new(
            model,
            harness.tools.clone(),
            Arc::new(SpecialistIterationManager::new(config)),
            harness.store.clone(),
        )
    }

    fn with_override(specialist: &str, max: u32) -> IterationConfig {
        let mut config = IterationConfig::default();
        config.specialist_overrides.insert(specialist.to_string(), max);
        config
    }

    async fn logged(harness: &Harness, project: Option<&str>) -> UnifiedSessionFile {
        harness
            .store
            .repository()
            .read(project)
            .await
            .unwrap()
            .unwrap()
            .file
    }

    const WRITE: &str = r#"{"content":"drafting","tool_calls":[{"name":"writeFile","args":{"path":"SRS.md"}}]}"#;
    const DONE: &str = r#"{"tool_calls":[{"name":"taskComplete","args":{"summary":"FR section written"}}]}"#;

    #[tokio::test]
    async fn test_completes_and_logs_invocation() {
        let h = harness(MockToolExecutor::default(), Some("alpha")).await;
        let model = ScriptedChatModel::replies(&[WRITE, DONE]);

        let report = looped(&h, model.clone(), IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write the functional requirements"))
            .await;

        assert!(
            matches!(&report.outcome, LoopOutcome::Completed { summary } if summary == "FR section written")
        );
        assert_eq!(report.iterations, 2);
        assert_eq!(report.working_dir, h.temp_dir.path().join("alpha"));
        assert_eq!(
            h.tools.calls.lock().unwrap().clone(),
            vec![("writeFile".to_string(), h.temp_dir.path().join("alpha"))]
        );
        assert!(report.history[0].starts_with("迭代 1 - AI计划:"));
        assert!(report.history[1].starts_with("迭代 1 - 工具结果:"));
        assert!(model.user_prompt(1).contains("writeFile: 成功"));

        let file = logged(&h, Some("alpha")).await;
        let last = file.operations.last().unwrap();
        assert_eq!(last.operation_type, OperationType::SpecialistInvoked);
        assert_eq!(last.specialist_id.as_deref(), Some("fr_writer"));
        assert!(last.success);
        assert_eq!(last.details.as_ref().unwrap()["iterations"], 2);
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_not_fatal() {
        let tools = MockToolExecutor {
            failing: vec!["writeFile"],
            ..Default::default()
        };
        let h = harness(tools, Some("alpha")).await;
        let model = ScriptedChatModel::replies(&[WRITE, DONE]);

        let report = looped(&h, model.clone(), IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(report.outcome.is_success());
        let second_prompt = model.user_prompt(1);
        assert!(second_prompt.contains(TOOL_RESULT_MARKER));
        assert!(second_prompt.contains("失败"));
        assert!(second_prompt.contains("writeFile exploded"));

        let file = logged(&h, Some("alpha")).await;
        let failure = file
            .operations
            .iter()
            .find(|op| op.operation_type == OperationType::ToolExecutionFailed)
            .unwrap();
        assert_eq!(failure.tool_name.as_deref(), Some("writeFile"));
        assert!(!failure.success);
    }

    #[tokio::test]
    async fn test_stops_at_iteration_limit() {
        let h = harness(MockToolExecutor::default(), Some("alpha")).await;
        let model = ScriptedChatModel::replies(&[WRITE]);

        let report = looped(&h, model.clone(), with_override("fr_writer", 3))
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(matches!(report.outcome, LoopOutcome::IterationLimitReached));
        assert_eq!(report.iterations, 3);
        assert_eq!(model.calls(), 3);
        assert_eq!(report.limit.source, "specialistOverrides[fr_writer]");
        assert!(model.user_prompt(2).contains("3/3"));
    }

    #[tokio::test]
    async fn test_zero_budget_never_calls_model() {
        let h = harness(MockToolExecutor::default(), None).await;
        let model = ScriptedChatModel::replies(&[DONE]);

        let report = looped(&h, model.clone(), with_override("fr_writer", 0))
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(matches!(report.outcome, LoopOutcome::IterationLimitReached));
        assert_eq!(report.iterations, 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_reply_without_tools_gets_nudged() {
        let h = harness(MockToolExecutor::default(), Some("alpha")).await;
        let model = ScriptedChatModel::replies(&["Let me think about it.", DONE]);

        let report = looped(&h, model.clone(), IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(report.iterations, 2);
        assert!(model.user_prompt(1).contains(NO_TOOL_NUDGE));
        assert!(h.tools.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_network_errors_are_retried() {
        let h = harness(MockToolExecutor::default(), Some("alpha")).await;
        let reset = || Err(ModelError::new("socket hang up").with_code("ECONNRESET"));
        let model = ScriptedChatModel::new(vec![reset(), reset(), Ok(DONE.to_string())]);

        let report = looped(&h, model.clone(), IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(report.iterations, 1);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_ends_run_and_is_logged() {
        let h = harness(MockToolExecutor::default(), None).await;
        let model = ScriptedChatModel::new(vec![Err(
            ModelError::new("HTTP 401 Unauthorized: bad key").with_status(401)
        )]);

        let report = looped(&h, model.clone(), IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        let LoopOutcome::Failed(error) = &report.outcome else {
            panic!("expected failure, got {:?}", report.outcome);
        };
        assert_eq!(error.model_category(), Some("auth"));
        assert_eq!(model.calls(), 1);
        assert_eq!(report.working_dir, h.temp_dir.path());

        // Without an active project the run is logged to the main session file
        let file = logged(&h, None).await;
        let entry = file.operations.last().unwrap();
        assert_eq!(entry.operation_type, OperationType::SpecialistInvoked);
        assert!(!entry.success);
        assert!(entry.error.is_some());
    }

    #[tokio::test]
    async fn test_tools_after_task_complete_are_not_run() {
        let h = harness(MockToolExecutor::default(), Some("alpha")).await;
        let model = ScriptedChatModel::replies(&[
            r#"{"tool_calls":[{"name":"readFile","args":{}},{"name":"taskComplete","args":{}},{"name":"writeFile","args":{}}],"content":"all set"}"#,
        ]);

        let report = looped(&h, model, IterationConfig::default())
            .run(&SpecialistTask::new("fr_writer", "Write"))
            .await;

        assert!(
            matches!(&report.outcome, LoopOutcome::Completed { summary } if summary == "all set")
        );
        let calls: Vec<String> = h
            .tools
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert_eq!(calls, vec!["readFile"]);
    }
}
