//! Tool invocation boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use srsw_core::error::Result;
use std::path::Path;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Returns a string argument, if present.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Executes the tools a specialist may call.
///
/// A returned error is not fatal to the specialist: the loop records it as a
/// failed tool result and lets the model react in the next iteration.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs one tool call.
    ///
    /// # Arguments
    ///
    /// * `call` - The tool name and its JSON arguments
    /// * `working_dir` - The active project's directory, or the workspace root
    async fn execute(&self, call: &ToolCall, working_dir: &Path) -> Result<Value>;
}
