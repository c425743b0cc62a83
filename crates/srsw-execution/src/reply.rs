//! Model reply parsing.
//!
//! Specialists answer with a JSON object:
//!
//! ```json
//! { "content": "what I am doing", "tool_calls": [{ "name": "writeFile", "args": {} }] }
//! ```
//!
//! Both keys are optional. The object may be wrapped in a fenced ```json block.
//! Anything that is not such an object is treated as plain content with no
//! tool calls.

use crate::tool::ToolCall;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("fenced JSON pattern must compile")
});

/// A parsed model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

impl From<WireReply> for ModelReply {
    fn from(wire: WireReply) -> Self {
        Self {
            content: wire.content.filter(|content| !content.trim().is_empty()),
            tool_calls: wire.tool_calls,
        }
    }
}

/// Parses raw model text.
pub fn parse_reply(text: &str) -> ModelReply {
    let trimmed = text.trim();

    if let Ok(wire) = serde_json::from_str::<WireReply>(trimmed) {
        return wire.into();
    }

    let fenced = FENCED_JSON
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str::<WireReply>(m.as_str()).ok());
    if let Some(wire) = fenced {
        return wire.into();
    }

    ModelReply {
        content: Some(trimmed.to_string()).filter(|content| !content.is_empty()),
        tool_calls: Vec::new(),
    }
}

impl ModelReply {
    /// Human-readable plan text recorded in history.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        if let Some(content) = &self.content {
            lines.push(content.clone());
        }
        for call in &self.tool_calls {
            lines.push(format!("- 调用 {} {}", call.name, call.args));
        }
        if lines.is_empty() {
            lines.push("(空回复)".to_string());
        }
        lines.join("\n")
    }
}
