//! Specialist categories and category lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Broad kind of work a specialist performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistCategory {
    /// Writes document content (requirements, descriptions, journeys...)
    Content,
    /// Performs project housekeeping (init, formatting, git...)
    Process,
}

impl SpecialistCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistCategory::Content => "content",
            SpecialistCategory::Process => "process",
        }
    }
}

impl fmt::Display for SpecialistCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks up the category of a specialist.
///
/// Returning `None` means "unknown here, try the next source".
pub trait CategoryProvider: Send + Sync {
    fn lookup(&self, specialist_id: &str) -> Option<SpecialistCategory>;
}

/// A specialist known to the runtime registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistDefinition {
    pub id: String,
    pub category: SpecialistCategory,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Runtime registry of specialist definitions.
///
/// Disabled specialists are reported as unknown so callers fall through to
/// the legacy table.
#[derive(Debug, Clone, Default)]
pub struct SpecialistRegistry {
    specialists: HashMap<String, SpecialistDefinition>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: SpecialistDefinition) {
        self.specialists.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, specialist_id: &str) -> Option<&SpecialistDefinition> {
        self.specialists.get(specialist_id)
    }
}

impl FromIterator<SpecialistDefinition> for SpecialistRegistry {
    fn from_iter<I: IntoIterator<Item = SpecialistDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for definition in iter {
            registry.register(definition);
        }
        registry
    }
}

impl CategoryProvider for SpecialistRegistry {
    fn lookup(&self, specialist_id: &str) -> Option<SpecialistCategory> {
        self.specialists
            .get(specialist_id)
            .filter(|definition| definition.enabled)
            .map(|definition| definition.category)
    }
}

const LEGACY_CONTENT_SPECIALISTS: &[&str] = &[
    "summary_writer",
    "overall_description_writer",
    "fr_writer",
    "nfr_writer",
    "user_journey_writer",
    "user_story_writer",
    "use_case_writer",
    "biz_req_and_rule_writer",
    "ifr_and_dar_writer",
    "adc_writer",
    "prototype_designer",
];

const LEGACY_PROCESS_SPECIALISTS: &[&str] = &[
    "project_initializer",
    "requirement_syncer",
    "document_formatter",
    "git_operator",
    "srs_reviewer",
];

/// Static id → category table used when the registry has no answer.
#[derive(Debug, Clone)]
pub struct StaticCategoryProvider {
    table: HashMap<String, SpecialistCategory>,
}

impl StaticCategoryProvider {
    pub fn new(table: HashMap<String, SpecialistCategory>) -> Self {
        Self { table }
    }
}

impl Default for StaticCategoryProvider {
    fn default() -> Self {
        let content = LEGACY_CONTENT_SPECIALISTS
            .iter()
            .map(|id| (id.to_string(), SpecialistCategory::Content));
        let process = LEGACY_PROCESS_SPECIALISTS
            .iter()
            .map(|id| (id.to_string(), SpecialistCategory::Process));
        Self::new(content.chain(process).collect())
    }
}

impl CategoryProvider for StaticCategoryProvider {
    fn lookup(&self, specialist_id: &str) -> Option<SpecialistCategory> {
        self.table.get(specialist_id).copied()
    }
}
