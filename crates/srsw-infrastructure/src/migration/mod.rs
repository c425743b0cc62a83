//! Session file format migrations.
//!
//! Unified session files are migrated as raw JSON before being deserialized,
//! so every historical shape can be read without keeping old Rust types around.
//!
//! # Module Structure
//!
//! - `traits`: `Migration`, `TypedMigration` and `MigrationChain`
//! - `registry`: a linear, semver-ordered chain of migrations
//! - `session`: version detection and the concrete session file steps

pub mod registry;
pub mod session;
pub mod traits;

pub use registry::MigrationRegistry;
pub use session::{
    EnvelopeV4ToV5, LATEST_FILE_VERSION, LegacyContextToV4, detect_file_version,
    normalize_version, session_file_migrations,
};
pub use traits::{Migration, MigrationChain, TypedMigration};
