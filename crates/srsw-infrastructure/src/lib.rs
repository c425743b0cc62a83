//! Infrastructure adapters for SRS Writer.
//!
//! Implements the collaborator traits defined in `srsw-core` against the real
//! world: the local file system, the `git` binary, TOML configuration files and
//! an OpenAI-compatible chat-completion endpoint.

pub mod config_service;
pub mod exit_flag;
pub mod fs;
pub mod git_cli;
pub mod migration;
pub mod openai_chat_model;
pub mod paths;
pub mod session_file_repository;

pub use crate::config_service::ConfigService;
pub use crate::exit_flag::{ExitFlag, ExitFlagRepository};
pub use crate::fs::TokioFileSystem;
pub use crate::git_cli::GitCliBranchProvider;
pub use crate::openai_chat_model::OpenAiChatModel;
pub use crate::paths::{SessionPaths, SrsPaths};
pub use crate::session_file_repository::{JsonSessionFileRepository, LoadedSessionFile};
