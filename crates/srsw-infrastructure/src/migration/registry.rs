//! Migration registry for managing linear migration chains.
//!
//! Each version migrates through all intermediate versions; no step is ever
//! skipped, which keeps every historical shape debuggable in isolation.

use super::traits::{MigrationChain, TypedMigration};
use anyhow::{Context, Result, bail, ensure};
use semver::Version;
use std::sync::Arc;

/// Registry for a linear chain of migrations.
///
/// Migrations must form a continuous chain (`0.0.0 → 4.0.0 → 5.0.0 → ...`);
/// `register` rejects a step whose `from_version` does not match the previous
/// step's `to_version`.
#[derive(Debug)]
pub struct MigrationRegistry<T> {
    migrations: Vec<Arc<dyn TypedMigration<T, T>>>,
    latest_version: Version,
}

impl<T> MigrationRegistry<T> {
    /// Creates an empty registry targeting `latest_version`.
    pub fn new(latest_version: Version) -> Self {
        Self {
            migrations: Vec::new(),
            latest_version,
        }
    }

    pub fn latest_version(&self) -> &Version {
        &self.latest_version
    }

    /// Registers a single migration, validating chain continuity.
    ///
    /// # Errors
    ///
    /// Returns an error if the migration does not connect to the existing chain
    /// or targets a version past `latest_version`.
    pub fn register(&mut self, migration: Arc<dyn TypedMigration<T, T>>) -> Result<()> {
        if let Some(last) = self.migrations.last() {
            ensure!(
                last.to_version() == migration.from_version(),
                "Migration chain broken: expected migration from {} but got '{}' from {}",
                last.to_version(),
                migration.description(),
                migration.from_version()
            );
        }
        ensure!(
            migration.to_version() <= self.latest_version,
            "Migration target version {} exceeds registry's latest version {}",
            migration.to_version(),
            self.latest_version
        );

        self.migrations.push(migration);
        Ok(())
    }

    /// Registers multiple migrations, in chain order.
    pub fn register_all(&mut self, migrations: Vec<Arc<dyn TypedMigration<T, T>>>) -> Result<()> {
        for migration in migrations {
            self.register(migration)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Finds the step to start from: the last migration whose source version is
    /// not newer than `version`.
    ///
    /// Tagged versions that fall between two steps (e.g. `4.2.0`) start from the
    /// step below them.
    fn find_start_index(&self, version: &Version) -> Option<usize> {
        self.migrations
            .iter()
            .rposition(|m| &m.from_version() <= version)
    }
}

impl<T> MigrationChain<T> for MigrationRegistry<T> {
    fn migrate_to_latest(&self, mut data: T, current_version: &Version) -> Result<T> {
        if current_version == &self.latest_version {
            return Ok(data);
        }

        if current_version > &self.latest_version {
            bail!(
                "Data version ({}) is newer than the latest supported version ({})",
                current_version,
                self.latest_version
            );
        }

        let start_idx = self.find_start_index(current_version).ok_or_else(|| {
            let available: Vec<String> = self
                .migrations
                .iter()
                .map(|m| format!("{} -> {}", m.from_version(), m.to_version()))
                .collect();
            anyhow::anyhow!(
                "No migration found starting from version {}. Available migrations: [{}]",
                current_version,
                available.join(", ")
            )
        })?;

        let steps = self.migrations.len() - start_idx;
        for (i, migration) in self.migrations[start_idx..].iter().enumerate() {
            tracing::debug!(
                "[Migration] Step {}/{}: {} -> {} ({})",
                i + 1,
                steps,
                migration.from_version(),
                migration.to_version(),
                migration.description()
            );

            data = migration.migrate(data).with_context(|| {
                format!(
                    "Migration failed at step {}: {} -> {}",
                    i + 1,
                    migration.from_version(),
                    migration.to_version()
                )
            })?;
        }

        tracing::info!(
            "[Migration] Migrated {} -> {} ({} steps)",
            current_version,
            self.latest_version,
            steps
        );
        Ok(data)
    }

    fn available_path(&self, from: &Version) -> Vec<Version> {
        match self.find_start_index(from) {
            Some(start_idx) if from < &self.latest_version => {
                let mut path = vec![from.clone()];
                path.extend(self.migrations[start_idx..].iter().map(|m| m.to_version()));
                path
            }
            _ => Vec::new(),
        }
    }
}
