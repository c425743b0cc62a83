//! Operation log entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of operations recorded in a project's unified session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    SessionCreated,
    SessionUpdated,
    SessionLoaded,
    SessionRecovered,
    ProjectSwitched,
    ProjectRenamed,
    ProjectDeleted,
    SpecialistInvoked,
    ToolExecutionFailed,
    UserResponseReceived,
    FormatMigrated,
    /// Types written by other tools or older versions
    #[serde(other)]
    Unknown,
}

/// One line of the append-only operation log.
///
/// Unknown keys from hand-edited or newer files are kept in `extra` so a
/// read-modify-write cycle never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    #[serde(default)]
    pub session_context_id: String,
    /// Human-readable description
    pub operation: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl OperationLogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        operation_type: OperationType,
        session_context_id: impl Into<String>,
        operation: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation_type,
            session_context_id: session_context_id.into(),
            operation: operation.into(),
            success,
            specialist_id: None,
            tool_name: None,
            execution_time: None,
            user_input: None,
            error: None,
            file_changes: Vec::new(),
            details: None,
            extra: Map::new(),
        }
    }

    pub fn with_specialist(mut self, specialist_id: impl Into<String>) -> Self {
        self.specialist_id = Some(specialist_id.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_execution_time(mut self, millis: u64) -> Self {
        self.execution_time = Some(millis);
        self
    }

    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_file_changes(mut self, files: Vec<String>) -> Self {
        self.file_changes = files;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_wire_names() {
        let json = serde_json::to_string(&OperationType::ProjectSwitched).unwrap();
        assert_eq!(json, "\"PROJECT_SWITCHED\"");

        let parsed: OperationType = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(parsed, OperationType::Unknown);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let json = r#"{
            "timestamp": "2024-01-01T00:00:00Z",
            "type": "SESSION_UPDATED",
            "sessionContextId": "s1",
            "operation": "edited by hand",
            "success": true,
            "reviewer": "alice"
        }"#;
        let entry: OperationLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.extra.get("reviewer"), Some(&Value::from("alice")));

        let written = serde_json::to_value(&entry).unwrap();
        assert_eq!(written["reviewer"], "alice");
        assert!(written.get("toolName").is_none());
    }
}
