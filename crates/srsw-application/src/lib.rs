//! Application layer for SRS Writer.
//!
//! Owns the process-wide session state: `SessionStateStore` mediates every
//! read and write of the unified session files, and `SessionRecoveryEngine`
//! decides which session to restore when the process starts.

pub mod session;

pub use session::{
    ProjectBranchConvention, RecoveryOutcome, SessionRecoveryEngine, SessionStateStore,
};
