//! Parsing flat history strings into structured entries.
//!
//! The execution loop accumulates history as plain strings such as
//! `迭代 3 - AI计划:` or `Iteration 3 - Tool Results:`. The compressor needs the
//! iteration number and entry kind back, so they are recovered here with
//! lightweight pattern matching.

use super::tokens::estimate_tokens;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Literal marker identifying tool execution output.
pub const TOOL_RESULT_MARKER: &str = "工具执行结果";

static ITERATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"迭代\s*(\d+)",
        r"第\s*(\d+)\s*(?:轮|次迭代)",
        r"(?i)\biteration\s*(\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("history iteration pattern must compile"))
    .collect()
});

const USER_RESPONSE_MARKERS: &[&str] = &["用户回复", "用户响应", "user response", "user reply"];
const PLAN_MARKERS: &[&str] = &["ai计划", "ai plan", "计划:", "计划：", "plan:"];
const RESULT_MARKERS: &[&str] = &[TOOL_RESULT_MARKER, "工具结果", "结果", "tool result", "result"];

/// Kind of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Plan,
    Result,
    UserResponse,
}

/// A history string with the structure recovered from its text.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Iteration parsed from the text, 0 when no marker is present
    pub iteration: u32,
    pub entry_type: EntryType,
    pub content: String,
    pub tokens: usize,
    /// Position in the original history list
    pub original_index: usize,
}

impl HistoryEntry {
    /// Parses one history string.
    pub fn parse(content: &str, original_index: usize) -> Self {
        Self {
            iteration: parse_iteration(content),
            entry_type: parse_entry_type(content),
            content: content.to_string(),
            tokens: estimate_tokens(content),
            original_index,
        }
    }

    /// Returns true when this entry holds raw tool output.
    pub fn is_tool_result(&self) -> bool {
        self.content.contains(TOOL_RESULT_MARKER)
    }
}

/// Extracts the first iteration marker, defaulting to 0.
pub fn parse_iteration(content: &str) -> u32 {
    ITERATION_PATTERNS
        .iter()
        .find_map(|pattern| {
            pattern
                .captures(content)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        })
        .unwrap_or(0)
}

/// Infers the entry type from marker vocabulary, defaulting to `Result`.
///
/// The first line is consulted before the body so a plan that merely mentions
/// "结果" is not mistaken for a result.
pub fn parse_entry_type(content: &str) -> EntryType {
    let lower = content.to_lowercase();
    let header = lower.lines().next().unwrap_or_default();

    classify_markers(header)
        .or_else(|| classify_markers(&lower))
        .unwrap_or(EntryType::Result)
}

fn classify_markers(text: &str) -> Option<EntryType> {
    let has_any = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if has_any(USER_RESPONSE_MARKERS) {
        Some(EntryType::UserResponse)
    } else if has_any(RESULT_MARKERS) {
        Some(EntryType::Result)
    } else if has_any(PLAN_MARKERS) {
        Some(EntryType::Plan)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iteration_variants() {
        assert_eq!(parse_iteration("迭代1结果A"), 1);
        assert_eq!(parse_iteration("迭代 12 - AI计划:\n..."), 12);
        assert_eq!(parse_iteration("第 7 轮 用户回复"), 7);
        assert_eq!(parse_iteration("Iteration 4 - Tool Results"), 4);
        assert_eq!(parse_iteration("no marker at all"), 0);
        assert_eq!(parse_iteration("迭代 99999999999999999999"), 0);
    }

    #[test]
    fn test_parse_entry_type() {
        assert_eq!(parse_entry_type("迭代 2 - AI计划:\nread file"), EntryType::Plan);
        assert_eq!(
            parse_entry_type("迭代 2 - 工具执行结果:\nok"),
            EntryType::Result
        );
        assert_eq!(
            parse_entry_type("迭代 2 - 用户回复: 继续"),
            EntryType::UserResponse
        );
        assert_eq!(parse_entry_type("something vague"), EntryType::Result);
        assert_eq!(
            parse_entry_type("迭代 4 - AI计划:\n检查上一步结果"),
            EntryType::Plan
        );
    }

    #[test]
    fn test_tool_result_detection() {
        let entry = HistoryEntry::parse("迭代 3 - 工具执行结果:\n{...}", 0);
        assert!(entry.is_tool_result());
        let entry = HistoryEntry::parse("迭代 3 - AI计划: x", 1);
        assert!(!entry.is_tool_result());
        assert_eq!(entry.original_index, 1);
    }
}
