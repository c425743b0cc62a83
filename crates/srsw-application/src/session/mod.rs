//! Session state management.
//!
//! # Module Structure
//!
//! - `branch`: the `SRS/<project>` Git branch convention
//! - `state_store`: `SessionStateStore`, the single owner of the current session
//! - `recovery`: `SessionRecoveryEngine`, the startup state machine

mod branch;
mod recovery;
mod state_store;

pub use branch::ProjectBranchConvention;
pub use recovery::{EXIT_FLAG_WINDOW_MS, RecoveryOutcome, SessionRecoveryEngine};
pub use state_store::SessionStateStore;
