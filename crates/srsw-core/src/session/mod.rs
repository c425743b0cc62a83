//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the in-memory session snapshot (`SessionContext`) and partial updates
//! - `operation`: operation log entries (`OperationLogEntry`, `OperationType`)
//! - `unified`: the on-disk envelope (`UnifiedSessionFile`)
//! - `validation`: project name allow-list

mod model;
mod operation;
mod unified;
mod validation;

pub use model::{SESSION_SCHEMA_VERSION, SessionContext, SessionMetadata, SessionPatch};
pub use operation::{OperationLogEntry, OperationType};
pub use unified::{CURRENT_FILE_VERSION, TimeRange, UnifiedSessionFile};
pub use validation::validate_project_name;
