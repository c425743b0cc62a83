//! Core domain types and pure logic for SRS Writer.
//!
//! This crate knows nothing about where sessions live on disk or which model
//! provider answers prompts. It defines:
//!
//! - `session`: the session snapshot, the unified on-disk envelope and its
//!   operation log, plus project name validation
//! - `specialist`: per-specialist iteration budgets
//! - `history`: token estimation and tiered history compression
//! - `model`: the chat-completion boundary and the retry policy wrapped around it
//! - `fs` / `git`: collaborator traits implemented by the infrastructure crate

pub mod config;
pub mod error;
pub mod fs;
pub mod git;
pub mod history;
pub mod model;
pub mod session;
pub mod specialist;

pub use error::{Result, SrsError};
