//! Unified session file migrations.
//!
//! ## Version History
//!
//! - **0.0.0 (legacy)**: a bare `SessionContext` object with no envelope
//! - **4.0**: `{ fileVersion, currentSession, operations }`
//! - **5.0 (current)**: adds `timeRange`, `createdAt`, `lastUpdated`, and every
//!   operation carries a `sessionContextId`
//!
//! `fileVersion` is stored as `"major.minor"`; it is normalized to full semver
//! (`"5.0"` → `5.0.0`) before it reaches the registry.

use super::registry::MigrationRegistry;
use super::traits::{Migration, TypedMigration};
use anyhow::{Context, Result, anyhow, bail};
use semver::Version;
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const LATEST_FILE_VERSION: Version = Version::new(5, 0, 0);

const LEGACY_VERSION: Version = Version::new(0, 0, 0);
const ENVELOPE_V4: Version = Version::new(4, 0, 0);

/// Normalizes a `fileVersion` tag into semver: `"5"`, `"5.0"` and `"5.0.0"` all
/// become `5.0.0`.
pub fn normalize_version(tag: &str) -> Result<Version> {
    let tag = tag.trim().trim_start_matches('v');
    let parts: Vec<&str> = tag.split('.').collect();
    let full = match parts.len() {
        1 => format!("{}.0.0", tag),
        2 => format!("{}.0", tag),
        _ => tag.to_string(),
    };
    Version::parse(&full).with_context(|| format!("Invalid fileVersion tag '{}'", tag))
}

/// Detects the format version of a raw session document.
///
/// # Errors
///
/// Returns an error when the document is not an object, carries an unparseable
/// `fileVersion`, or looks like neither an envelope nor a bare session.
pub fn detect_file_version(document: &Value) -> Result<Version> {
    let object = document
        .as_object()
        .ok_or_else(|| anyhow!("Session file root must be a JSON object"))?;

    match object.get("fileVersion") {
        Some(Value::String(tag)) => return normalize_version(tag),
        Some(Value::Number(number)) => return normalize_version(&number.to_string()),
        Some(other) => bail!("fileVersion must be a string, got {}", other),
        None => {}
    }

    if object.contains_key("currentSession") || object.contains_key("operations") {
        return Ok(ENVELOPE_V4);
    }

    let looks_like_session = ["sessionContextId", "projectName", "baseDir", "activeFiles"]
        .iter()
        .any(|key| object.contains_key(*key));
    if looks_like_session {
        return Ok(LEGACY_VERSION);
    }

    bail!("Unrecognized session file shape")
}

/// Wraps a bare legacy `SessionContext` into a 4.0 envelope.
///
/// The synthesized log holds a single `FORMAT_MIGRATED` entry so the
/// conversion is visible in the project's history.
#[derive(Debug)]
pub struct LegacyContextToV4;

impl Migration for LegacyContextToV4 {
    fn from_version(&self) -> Version {
        LEGACY_VERSION
    }

    fn to_version(&self) -> Version {
        ENVELOPE_V4
    }

    fn description(&self) -> &str {
        "Wrap bare session context into a unified envelope"
    }
}

impl TypedMigration<Value, Value> for LegacyContextToV4 {
    fn migrate(&self, from: Value) -> Result<Value> {
        if !from.is_object() {
            bail!("Legacy session must be a JSON object");
        }

        let session_context_id = from
            .get("sessionContextId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let marker = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "type": "FORMAT_MIGRATED",
            "sessionContextId": session_context_id,
            "operation": "Converted legacy session file to the unified format",
            "success": true,
        });

        let mut envelope = Map::new();
        envelope.insert("fileVersion".to_string(), json!("4.0"));
        envelope.insert("currentSession".to_string(), from);
        envelope.insert("operations".to_string(), json!([marker]));
        Ok(Value::Object(envelope))
    }
}

/// Adds the 5.0 bookkeeping fields to a 4.0 envelope.
#[derive(Debug)]
pub struct EnvelopeV4ToV5;

impl EnvelopeV4ToV5 {
    fn timestamp_of(entry: &Value) -> Option<String> {
        entry
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl Migration for EnvelopeV4ToV5 {
    fn from_version(&self) -> Version {
        ENVELOPE_V4
    }

    fn to_version(&self) -> Version {
        LATEST_FILE_VERSION
    }

    fn description(&self) -> &str {
        "Add time range and per-operation session ids"
    }
}

impl TypedMigration<Value, Value> for EnvelopeV4ToV5 {
    fn migrate(&self, from: Value) -> Result<Value> {
        let Value::Object(mut envelope) = from else {
            bail!("Session envelope must be a JSON object");
        };
        let now = chrono::Utc::now().to_rfc3339();

        let current_session = envelope.remove("currentSession").unwrap_or(Value::Null);
        let session_id = current_session
            .get("sessionContextId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut operations = match envelope.remove("operations") {
            Some(Value::Array(operations)) => operations,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => bail!("operations must be an array, got {}", other),
        };
        for entry in operations.iter_mut() {
            if let Value::Object(fields) = entry {
                fields
                    .entry("sessionContextId")
                    .or_insert_with(|| json!(session_id));
            }
        }

        let start_date = operations
            .first()
            .and_then(Self::timestamp_of)
            .unwrap_or_else(|| now.clone());
        let end_date = operations
            .last()
            .and_then(Self::timestamp_of)
            .unwrap_or_else(|| now.clone());
        let created_at = current_session
            .pointer("/metadata/created")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| start_date.clone());

        let mut migrated = Map::new();
        migrated.insert("fileVersion".to_string(), json!("5.0"));
        migrated.insert("currentSession".to_string(), current_session);
        migrated.insert("operations".to_string(), Value::Array(operations));
        migrated.insert(
            "timeRange".to_string(),
            json!({ "startDate": start_date, "endDate": end_date }),
        );
        migrated.insert("createdAt".to_string(), json!(created_at));
        migrated.insert("lastUpdated".to_string(), json!(now));
        Ok(Value::Object(migrated))
    }
}

/// Builds the registry of session file migrations.
pub fn session_file_migrations() -> Result<MigrationRegistry<Value>> {
    let mut registry = MigrationRegistry::new(LATEST_FILE_VERSION);
    registry.register_all(vec![Arc::new(LegacyContextToV4), Arc::new(EnvelopeV4ToV5)])?;
    Ok(registry)
}
