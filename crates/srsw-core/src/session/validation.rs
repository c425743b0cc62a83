//! Project name validation.
//!
//! Project names become directory names and session file suffixes, so they
//! must be safe on every file system the extension runs on.

use crate::error::{Result, SrsError};

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Label of the main session file; a project with this name would share it.
const MAIN_SESSION_NAME: &str = "main";

const MAX_NAME_LEN: usize = 255;

/// Validates a project name against the allow-list rules.
///
/// Rejected: empty names, path separators, `..` traversal, characters that are
/// illegal on common file systems, control characters, reserved device names
/// (with or without an extension), names ending in a space or dot, and `main`
/// in any case.
///
/// # Errors
///
/// Returns `SrsError::InvalidProjectName` naming the first rule that failed.
pub fn validate_project_name(name: &str) -> Result<()> {
    let reject = |reason: String| Err(SrsError::invalid_project_name(name, reason));

    if name.trim().is_empty() {
        return reject("name must not be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return reject(format!("name must be at most {} characters", MAX_NAME_LEN));
    }
    if name.contains('/') || name.contains('\\') {
        return reject("name must not contain path separators".to_string());
    }
    if name == "." || name.contains("..") {
        return reject("name must not contain '..' path traversal".to_string());
    }
    if let Some(c) = name.chars().find(|c| ILLEGAL_CHARS.contains(c)) {
        return reject(format!("name contains illegal character '{}'", c));
    }
    if name.chars().any(char::is_control) {
        return reject("name must not contain control characters".to_string());
    }
    if name.ends_with(' ') || name.ends_with('.') {
        return reject("name must not end with a space or dot".to_string());
    }

    let stem = name.split('.').next().unwrap_or(name).trim_end();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return reject(format!("'{}' is a reserved device name", stem));
    }

    if name.eq_ignore_ascii_case(MAIN_SESSION_NAME) {
        return reject(format!("'{}' is reserved for the main session", name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(name: &str) -> String {
        validate_project_name(name).unwrap_err().to_string()
    }

    #[test]
    fn test_accepts_ordinary_names() {
        assert!(validate_project_name("My Project 2").is_ok());
        assert!(validate_project_name("需求文档_v1").is_ok());
        assert!(validate_project_name("blackpink-fan-app").is_ok());
        assert!(validate_project_name("v1.2").is_ok());
    }

    #[test]
    fn test_rejects_traversal_and_separators() {
        assert!(reason("..").contains("path traversal"));
        assert!(reason("a..b").contains("path traversal"));
        assert!(reason("my/project").contains("path separators"));
        assert!(reason("my\\project").contains("path separators"));
    }

    #[test]
    fn test_rejects_reserved_device_names() {
        assert!(reason("CON").contains("reserved device name"));
        assert!(reason("con").contains("reserved device name"));
        assert!(reason("lpt1.txt").contains("reserved device name"));
        assert!(validate_project_name("CONSOLE").is_ok());
    }

    #[test]
    fn test_rejects_main_session_label() {
        assert!(reason("main").contains("reserved for the main session"));
        assert!(reason("Main").contains("reserved for the main session"));
        assert!(reason("MAIN").contains("reserved for the main session"));
        assert!(validate_project_name("mainline").is_ok());
    }

    #[test]
    fn test_rejects_illegal_characters_and_trailing() {
        assert!(reason("what?").contains("'?'"));
        assert!(reason("a:b").contains("':'"));
        assert!(reason("trailing ").contains("space or dot"));
        assert!(reason("trailing.").contains("space or dot"));
        assert!(reason("   ").contains("must not be empty"));
        assert!(reason("tab\tname").contains("control characters"));
    }
}
