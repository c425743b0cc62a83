//! Specialist execution for SRS Writer.
//!
//! - `specialist_loop`: the bounded, tool-calling `SpecialistExecutionLoop`
//! - `reply`: parsing model replies into content and tool calls
//! - `tool`: the `ToolExecutor` boundary
//! - `file_tools`: built-in read/write/list tools confined to the working directory
//! - `tracing_layer`: streams loop events to a UI channel

pub mod file_tools;
pub mod reply;
pub mod specialist_loop;
pub mod tool;
pub mod tracing_layer;

pub use file_tools::WorkspaceFileTools;
pub use reply::{ModelReply, parse_reply};
pub use specialist_loop::{
    LoopOutcome, LoopReport, SpecialistExecutionLoop, SpecialistTask, TASK_COMPLETE_TOOL,
};
pub use tool::{ToolCall, ToolExecutor};
pub use tracing_layer::{SpecialistEvent, SpecialistEventLayer};
