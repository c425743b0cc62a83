//! File system boundary.
//!
//! The session store never touches `std::fs`/`tokio::fs` directly. Every read,
//! write and move goes through [`FileSystem`], which keeps POSIX-style error
//! kinds (`ErrorKind::NotFound` for `ENOENT`, etc.) intact so callers can tell
//! "missing" apart from "unreadable".

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// Asynchronous file system primitive consumed by the session layer.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads a UTF-8 file into a string.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Writes `contents` to `path`, replacing any previous content.
    ///
    /// Implementations should make the replacement atomic (temp file + rename).
    async fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Renames a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Removes a single file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Creates a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Returns whether `path` exists. Permission errors count as "does not exist".
    async fn exists(&self, path: &Path) -> bool;

    /// Returns whether `path` is an existing directory.
    async fn is_dir(&self, path: &Path) -> bool;

    /// Lists the entry names (not full paths) of a directory.
    async fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Resolves symlinks and relative components of an existing path.
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}
