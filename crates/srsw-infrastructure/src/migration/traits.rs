//! Core traits for the migration framework.

use anyhow::Result;
use semver::Version;

/// Base trait for all migrations.
///
/// Provides version information and metadata about a migration step.
pub trait Migration: Send + Sync {
    /// Returns the source version this migration starts from.
    fn from_version(&self) -> Version;

    /// Returns the target version this migration produces.
    fn to_version(&self) -> Version;

    /// Checks if this migration can be applied to the given version.
    fn can_migrate(&self, version: &Version) -> bool {
        version == &self.from_version()
    }

    /// Returns a human-readable description of this migration.
    fn description(&self) -> &str;
}

/// Migration that transforms data from one version to another.
pub trait TypedMigration<From, To>: Migration + std::fmt::Debug {
    /// Executes the migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not have the shape this step expects.
    fn migrate(&self, from: From) -> Result<To>;
}

/// A chain of migrations that upgrades data to the latest version.
pub trait MigrationChain<T> {
    /// Migrates data from `current_version` to the latest version, applying
    /// every intermediate step in order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No migration path exists from the current version to the latest
    /// - Any migration in the chain fails
    fn migrate_to_latest(&self, data: T, current_version: &Version) -> Result<T>;

    /// Returns the versions visited when migrating from `from`.
    fn available_path(&self, from: &Version) -> Vec<Version>;
}
