//! Per-specialist iteration budgets.
//!
//! Resolution order, first match wins:
//!
//! 1. `specialistOverrides[id]` (a configured `0` is a real value)
//! 2. `categoryDefaults[category]`, category taken from the registry and then
//!    from the legacy static table
//! 3. `globalDefault`

use super::category::{CategoryProvider, SpecialistCategory, StaticCategoryProvider};
use crate::error::Result;
use crate::history::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Default budget per specialist category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryDefaults {
    pub content: u32,
    pub process: u32,
}

impl CategoryDefaults {
    pub fn get(&self, category: SpecialistCategory) -> u32 {
        match category {
            SpecialistCategory::Content => self.content,
            SpecialistCategory::Process => self.process,
        }
    }
}

impl Default for CategoryDefaults {
    fn default() -> Self {
        Self {
            content: 15,
            process: 10,
        }
    }
}

/// Iteration and history settings for specialists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterationConfig {
    pub category_defaults: CategoryDefaults,
    pub specialist_overrides: BTreeMap<String, u32>,
    pub global_default: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_config: Option<HistoryConfig>,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            category_defaults: CategoryDefaults::default(),
            specialist_overrides: BTreeMap::new(),
            global_default: 10,
            history_config: None,
        }
    }
}

impl IterationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(history) = &self.history_config {
            history.validate()?;
        }
        Ok(())
    }

    /// History settings, falling back to the defaults when none are configured.
    pub fn history(&self) -> HistoryConfig {
        self.history_config.clone().unwrap_or_default()
    }
}

/// Partial update for [`IterationConfig`].
///
/// Category defaults and overrides are merged per key; the global default and
/// history config are replaced when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterationConfigPatch {
    pub content_default: Option<u32>,
    pub process_default: Option<u32>,
    pub specialist_overrides: BTreeMap<String, u32>,
    pub global_default: Option<u32>,
    pub history_config: Option<HistoryConfig>,
}

/// A resolved budget and the configuration key it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationLimit {
    pub max_iterations: u32,
    pub source: String,
}

/// Stateless resolver over an [`IterationConfig`].
pub struct IterationLimitResolver {
    registry: Option<Arc<dyn CategoryProvider>>,
    fallback: StaticCategoryProvider,
}

impl Default for IterationLimitResolver {
    fn default() -> Self {
        Self {
            registry: None,
            fallback: StaticCategoryProvider::default(),
        }
    }
}

impl IterationLimitResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consults `registry` before the legacy static table.
    pub fn with_registry(mut self, registry: Arc<dyn CategoryProvider>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the legacy static table.
    pub fn with_fallback(mut self, fallback: StaticCategoryProvider) -> Self {
        self.fallback = fallback;
        self
    }

    /// Looks up a specialist's category, registry first.
    pub fn category_of(&self, specialist_id: &str) -> Option<SpecialistCategory> {
        self.registry
            .as_ref()
            .and_then(|registry| registry.lookup(specialist_id))
            .or_else(|| self.fallback.lookup(specialist_id))
    }

    /// Resolves the iteration budget for `specialist_id`. Total over any input.
    pub fn resolve(&self, config: &IterationConfig, specialist_id: &str) -> IterationLimit {
        if specialist_id.trim().is_empty() {
            return IterationLimit {
                max_iterations: config.global_default,
                source: "globalDefault".to_string(),
            };
        }

        if let Some(&max_iterations) = config.specialist_overrides.get(specialist_id) {
            return IterationLimit {
                max_iterations,
                source: format!("specialistOverrides[{}]", specialist_id),
            };
        }

        if let Some(category) = self.category_of(specialist_id) {
            return IterationLimit {
                max_iterations: config.category_defaults.get(category),
                source: format!("categoryDefaults[{}]", category),
            };
        }

        IterationLimit {
            max_iterations: config.global_default,
            source: "globalDefault".to_string(),
        }
    }
}

/// Owns the runtime-mutable iteration configuration.
///
/// Shared across the execution layer behind an `Arc`; updates take a write
/// lock so readers always see a complete configuration.
pub struct SpecialistIterationManager {
    config: RwLock<IterationConfig>,
    default_snapshot: IterationConfig,
    resolver: IterationLimitResolver,
}

impl SpecialistIterationManager {
    /// Creates a manager whose `reset_to_default` restores the built-in defaults.
    pub fn new(config: IterationConfig) -> Self {
        Self {
            config: RwLock::new(config),
            default_snapshot: IterationConfig::default(),
            resolver: IterationLimitResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: IterationLimitResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolves the budget for a specialist under the current configuration.
    pub fn resolve(&self, specialist_id: &str) -> IterationLimit {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());
        let limit = self.resolver.resolve(&config, specialist_id);
        tracing::debug!(
            specialist_id,
            max_iterations = limit.max_iterations,
            source = %limit.source,
            "[IterationManager] Resolved iteration limit"
        );
        limit
    }

    /// Returns a snapshot of the current configuration.
    pub fn config(&self) -> IterationConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the effective history compression settings.
    pub fn history_config(&self) -> HistoryConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .history()
    }

    /// Merges a partial update into the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Config` when the resulting history config is invalid;
    /// the previous configuration is kept in that case.
    pub fn update_config(&self, patch: IterationConfigPatch) -> Result<()> {
        let mut next = self.config();

        if let Some(content) = patch.content_default {
            next.category_defaults.content = content;
        }
        if let Some(process) = patch.process_default {
            next.category_defaults.process = process;
        }
        next.specialist_overrides.extend(patch.specialist_overrides);
        if let Some(global) = patch.global_default {
            next.global_default = global;
        }
        if let Some(history) = patch.history_config {
            next.history_config = Some(history);
        }
        next.validate()?;

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::info!("[IterationManager] Iteration config updated");
        Ok(())
    }

    /// Restores the default configuration snapshot.
    pub fn reset_to_default(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = self.default_snapshot.clone();
        tracing::info!("[IterationManager] Iteration config reset to defaults");
    }
}

impl Default for SpecialistIterationManager {
    fn default() -> Self {
        Self::new(IterationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialist::{SpecialistDefinition, SpecialistRegistry};

    fn config_with_override(id: &str, value: u32) -> IterationConfig {
        let mut config = IterationConfig::default();
        config.specialist_overrides.insert(id.to_string(), value);
        config
    }

    #[test]
    fn test_override_wins_even_when_zero() {
        let resolver = IterationLimitResolver::new();
        let config = config_with_override("fr_writer", 0);

        let limit = resolver.resolve(&config, "fr_writer");
        assert_eq!(limit.max_iterations, 0);
        assert_eq!(limit.source, "specialistOverrides[fr_writer]");
    }

    #[test]
    fn test_category_default_from_static_table() {
        let resolver = IterationLimitResolver::new();
        let config = IterationConfig::default();

        let limit = resolver.resolve(&config, "fr_writer");
        assert_eq!(limit.max_iterations, 15);
        assert_eq!(limit.source, "categoryDefaults[content]");

        let limit = resolver.resolve(&config, "project_initializer");
        assert_eq!(limit.max_iterations, 10);
        assert_eq!(limit.source, "categoryDefaults[process]");
    }

    #[test]
    fn test_registry_takes_precedence_and_disabled_falls_back() {
        let registry: SpecialistRegistry = vec![
            SpecialistDefinition {
                id: "custom_writer".into(),
                category: SpecialistCategory::Process,
                enabled: true,
            },
            SpecialistDefinition {
                id: "fr_writer".into(),
                category: SpecialistCategory::Process,
                enabled: false,
            },
        ]
        .into_iter()
        .collect();
        let resolver = IterationLimitResolver::new().with_registry(Arc::new(registry));
        let config = IterationConfig::default();

        assert_eq!(
            resolver.resolve(&config, "custom_writer").source,
            "categoryDefaults[process]"
        );
        // Disabled in the registry, found in the legacy table instead
        assert_eq!(
            resolver.resolve(&config, "fr_writer").source,
            "categoryDefaults[content]"
        );
    }

    #[test]
    fn test_unknown_and_empty_ids_use_global_default() {
        let resolver = IterationLimitResolver::new();
        let config = IterationConfig {
            global_default: 7,
            ..IterationConfig::default()
        };

        for id in ["", "   ", "no_such_specialist", "迭代"] {
            let limit = resolver.resolve(&config, id);
            assert_eq!(limit.max_iterations, 7);
            assert_eq!(limit.source, "globalDefault");
        }
    }

    #[test]
    fn test_update_and_reset() {
        let manager = SpecialistIterationManager::default();

        manager
            .update_config(IterationConfigPatch {
                content_default: Some(30),
                specialist_overrides: BTreeMap::from([("nfr_writer".to_string(), 3)]),
                global_default: Some(4),
                ..IterationConfigPatch::default()
            })
            .unwrap();

        assert_eq!(manager.resolve("fr_writer").max_iterations, 30);
        assert_eq!(manager.resolve("nfr_writer").max_iterations, 3);
        assert_eq!(manager.resolve("").max_iterations, 4);

        manager.reset_to_default();
        assert_eq!(manager.config(), IterationConfig::default());
        assert_eq!(manager.resolve("nfr_writer").max_iterations, 15);
    }

    #[test]
    fn test_invalid_history_update_is_rejected() {
        let manager = SpecialistIterationManager::default();
        let mut history = HistoryConfig::default();
        history.tier_ratios.immediate = 0.9;

        let result = manager.update_config(IterationConfigPatch {
            history_config: Some(history),
            global_default: Some(99),
            ..IterationConfigPatch::default()
        });

        assert!(result.is_err());
        assert_eq!(manager.config().global_default, 10);
    }
}
