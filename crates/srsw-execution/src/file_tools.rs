//! Built-in file tools confined to the specialist's working directory.
//!
//! | tool        | args                  | result                      |
//! |-------------|-----------------------|-----------------------------|
//! | `readFile`  | `path`                | file content                |
//! | `writeFile` | `path`, `content`     | `{path, bytes}`             |
//! | `listFiles` | `path` (optional)     | entry names, sorted         |

use crate::tool::{ToolCall, ToolExecutor};
use async_trait::async_trait;
use serde_json::{Value, json};
use srsw_core::error::{Result, SrsError};
use srsw_core::fs::FileSystem;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// File tools backed by a [`FileSystem`].
pub struct WorkspaceFileTools {
    fs: Arc<dyn FileSystem>,
}

impl WorkspaceFileTools {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    async fn read_file(&self, call: &ToolCall, working_dir: &Path) -> Result<Value> {
        let relative = required_arg(call, "path")?;
        let target = confine(working_dir, relative)?;

        // Symlinks inside the project must not lead out of it
        let canonical_dir = self.fs.canonicalize(working_dir).await?;
        let canonical_target = match self.fs.canonicalize(&target).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SrsError::not_found("file", relative));
            }
            Err(e) => return Err(e.into()),
        };
        if !canonical_target.starts_with(&canonical_dir) {
            return Err(SrsError::PathOutsideWorkspace(relative.to_string()));
        }

        let content = self.fs.read_to_string(&canonical_target).await?;
        Ok(Value::String(content))
    }

    async fn write_file(&self, call: &ToolCall, working_dir: &Path) -> Result<Value> {
        let relative = required_arg(call, "path")?;
        let content = required_arg(call, "content")?;
        let target = confine(working_dir, relative)?;

        // Checked before and after creating directories so a symlinked
        // subdirectory cannot redirect the write
        self.ensure_resolves_inside(working_dir, &target, relative).await?;
        if let Some(parent) = target.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        self.ensure_resolves_inside(working_dir, &target, relative).await?;
        self.fs.write(&target, content).await?;
        tracing::debug!("[FileTools] Wrote {} ({} bytes)", target.display(), content.len());
        Ok(json!({ "path": relative, "bytes": content.len() }))
    }

    /// Resolves the deepest existing ancestor of `target` and requires it to
    /// stay under `working_dir`.
    async fn ensure_resolves_inside(
        &self,
        working_dir: &Path,
        target: &Path,
        relative: &str,
    ) -> Result<()> {
        let canonical_dir = self.fs.canonicalize(working_dir).await?;
        let mut existing = target;
        while !self.fs.exists(existing).await {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => return Ok(()),
            }
        }
        let resolved = self.fs.canonicalize(existing).await?;
        if !resolved.starts_with(&canonical_dir) {
            return Err(SrsError::PathOutsideWorkspace(relative.to_string()));
        }
        Ok(())
    }

    async fn list_files(&self, call: &ToolCall, working_dir: &Path) -> Result<Value> {
        let relative = call.arg_str("path").unwrap_or(".");
        let target = confine(working_dir, relative)?;
        let names = self.fs.read_dir_names(&target).await?;
        Ok(json!(names))
    }
}

#[async_trait]
impl ToolExecutor for WorkspaceFileTools {
    async fn execute(&self, call: &ToolCall, working_dir: &Path) -> Result<Value> {
        match call.name.as_str() {
            "readFile" => self.read_file(call, working_dir).await,
            "writeFile" => self.write_file(call, working_dir).await,
            "listFiles" => self.list_files(call, working_dir).await,
            other => Err(SrsError::validation(format!("Unknown tool '{}'", other))),
        }
    }
}

fn required_arg<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str> {
    call.arg_str(key).ok_or_else(|| {
        SrsError::validation(format!("{} requires a string '{}' argument", call.name, key))
    })
}

/// Joins a relative path onto `working_dir`, rejecting absolute paths and `..`.
fn confine(working_dir: &Path, relative: &str) -> Result<PathBuf> {
    let relative_path = Path::new(relative);
    let escapes = relative_path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(SrsError::PathOutsideWorkspace(relative.to_string()));
    }
    Ok(working_dir.join(relative_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use srsw_infrastructure::fs::TokioFileSystem;
    use tempfile::TempDir;

    fn tools() -> WorkspaceFileTools {
        WorkspaceFileTools::new(Arc::new(TokioFileSystem::new()))
    }

    #[tokio::test]
    async fn test_write_then_read_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let tools = tools();

        let written = tools
            .execute(
                &ToolCall::new("writeFile", json!({"path": "docs/SRS.md", "content": "# SRS"})),
                temp_dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(written["bytes"], 5);

        let read = tools
            .execute(&ToolCall::new("readFile", json!({"path": "docs/SRS.md"})), temp_dir.path())
            .await
            .unwrap();
        assert_eq!(read, json!("# SRS"));

        let listed = tools
            .execute(&ToolCall::new("listFiles", json!({})), temp_dir.path())
            .await
            .unwrap();
        assert_eq!(listed, json!(["docs"]));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        let tools = tools();

        for path in ["../outside.md", "/etc/passwd", "a/../../b"] {
            let err = tools
                .execute(
                    &ToolCall::new("writeFile", json!({"path": path, "content": "x"})),
                    temp_dir.path(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, SrsError::PathOutsideWorkspace(_)), "{}", path);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writes_do_not_follow_symlinks_out() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();
        let tools = tools();

        for path in ["link/SRS.md", "link/nested/SRS.md"] {
            let err = tools
                .execute(
                    &ToolCall::new("writeFile", json!({"path": path, "content": "x"})),
                    temp_dir.path(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, SrsError::PathOutsideWorkspace(_)), "{}", path);
        }
        assert!(!outside.path().join("SRS.md").exists());
        assert!(!outside.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_missing_file_and_unknown_tool() {
        let temp_dir = TempDir::new().unwrap();
        let tools = tools();

        let missing = tools
            .execute(&ToolCall::new("readFile", json!({"path": "nope.md"})), temp_dir.path())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());

        let unknown = tools
            .execute(&ToolCall::new("deleteEverything", json!({})), temp_dir.path())
            .await
            .unwrap_err();
        assert!(unknown.is_validation());

        let no_args = tools
            .execute(&ToolCall::new("writeFile", json!({"path": "a.md"})), temp_dir.path())
            .await
            .unwrap_err();
        assert!(no_args.to_string().contains("'content'"));
    }
}
