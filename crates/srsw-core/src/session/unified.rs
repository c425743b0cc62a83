//! The unified session file envelope.

use super::model::SessionContext;
use super::operation::OperationLogEntry;
use crate::error::{Result, SrsError};
use serde::{Deserialize, Serialize};

/// Current `fileVersion` tag.
pub const CURRENT_FILE_VERSION: &str = "5.0";

/// First and last activity timestamps covered by the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_date: String,
    pub end_date: String,
}

/// The single JSON document persisted per project.
///
/// Field order is the on-disk key order; keep it stable so hand-edited files
/// diff cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedSessionFile {
    pub file_version: String,
    pub current_session: Option<SessionContext>,
    #[serde(default)]
    pub operations: Vec<OperationLogEntry>,
    pub time_range: TimeRange,
    pub created_at: String,
    pub last_updated: String,
}

impl UnifiedSessionFile {
    /// Creates an envelope with an empty operation log.
    pub fn new(current_session: Option<SessionContext>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            file_version: CURRENT_FILE_VERSION.to_string(),
            current_session,
            operations: Vec::new(),
            time_range: TimeRange {
                start_date: now.clone(),
                end_date: now.clone(),
            },
            created_at: now.clone(),
            last_updated: now,
        }
    }

    /// Appends an operation and refreshes the bookkeeping timestamps.
    pub fn append(&mut self, entry: OperationLogEntry) {
        self.time_range.end_date = entry.timestamp.clone();
        self.last_updated = chrono::Utc::now().to_rfc3339();
        self.operations.push(entry);
    }

    /// Returns the current session after checking it can be adopted.
    ///
    /// # Errors
    ///
    /// - `SrsError::InvalidSessionFile` when there is no current session
    /// - `SrsError::InvalidSessionFile` ("baseDir is missing or empty") when the
    ///   session has no usable directory
    pub fn valid_session(&self) -> Result<&SessionContext> {
        let session = self
            .current_session
            .as_ref()
            .ok_or_else(|| SrsError::invalid_session_file("currentSession is null"))?;
        session.validate()?;
        Ok(session)
    }

    /// Checks the envelope invariant applied at load time.
    ///
    /// A null `currentSession` is acceptable; a non-null one must carry a
    /// usable `baseDir`.
    pub fn validate(&self) -> Result<()> {
        match &self.current_session {
            Some(session) => session.validate(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OperationType, SessionContext};

    #[test]
    fn test_append_updates_time_range() {
        let mut file = UnifiedSessionFile::new(None);
        let mut entry =
            OperationLogEntry::new(OperationType::SessionCreated, "s1", "created", true);
        entry.timestamp = "2030-01-01T00:00:00+00:00".to_string();
        file.append(entry);

        assert_eq!(file.operations.len(), 1);
        assert_eq!(file.time_range.end_date, "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_validate_allows_null_session_but_not_empty_base_dir() {
        let file = UnifiedSessionFile::new(None);
        assert!(file.validate().is_ok());
        assert!(file.valid_session().is_err());

        let file = UnifiedSessionFile::new(Some(SessionContext::new(
            Some("p".into()),
            Some(String::new()),
        )));
        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("baseDir is missing or empty"));
    }

    #[test]
    fn test_serialized_key_order_is_stable() {
        let file = UnifiedSessionFile::new(None);
        let json = serde_json::to_string(&file).unwrap();
        let version_at = json.find("fileVersion").unwrap();
        let session_at = json.find("currentSession").unwrap();
        let ops_at = json.find("operations").unwrap();
        assert!(version_at < session_at && session_at < ops_at);
    }
}
