//! Token-budgeted, tiered history compression.
//!
//! History entries are bucketed by age relative to the current iteration:
//!
//! ```text
//! iteration >= current - 4          immediate  (everything, verbatim)
//! current - 8 <= iteration < c - 4  recent     (plans and results)
//! iteration < current - 8           milestone  (results only)
//! ```
//!
//! Each tier gets `floor(token_budget * ratio)` tokens and is filled greedily,
//! newest first. Entries that do not fit are skipped (tool results are replaced
//! by a short warning when the warning fits) and scanning continues, so a
//! single oversized entry never starves the smaller ones behind it.

use super::entry::{EntryType, HistoryEntry};
use super::tokens::estimate_tokens;
use crate::error::{Result, SrsError};
use serde::{Deserialize, Serialize};

const IMMEDIATE_WINDOW: i64 = 4;
const RECENT_WINDOW: i64 = 8;
const RATIO_TOLERANCE: f64 = 0.001;

pub const DEFAULT_TOKEN_BUDGET: u32 = 40_000;

/// Share of the total budget given to each tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRatios {
    pub immediate: f64,
    pub recent: f64,
    pub milestone: f64,
}

impl Default for TierRatios {
    fn default() -> Self {
        Self {
            immediate: 0.55,
            recent: 0.30,
            milestone: 0.15,
        }
    }
}

/// History compression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    pub compression_enabled: bool,
    pub token_budget: u32,
    pub tier_ratios: TierRatios,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            compression_enabled: true,
            token_budget: DEFAULT_TOKEN_BUDGET,
            tier_ratios: TierRatios::default(),
        }
    }
}

impl HistoryConfig {
    /// Checks that every ratio is a positive finite number and that they sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("immediate", self.tier_ratios.immediate),
            ("recent", self.tier_ratios.recent),
            ("milestone", self.tier_ratios.milestone),
        ];
        if let Some((name, value)) = ratios
            .iter()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
        {
            return Err(SrsError::config(format!(
                "historyConfig.tierRatios.{} must be a positive number, got {}",
                name, value
            )));
        }

        let sum: f64 = ratios.iter().map(|(_, value)| value).sum();
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(SrsError::config(format!(
                "historyConfig.tierRatios must sum to 1.0, got {:.3}",
                sum
            )));
        }
        Ok(())
    }

    fn tier_budget(&self, ratio: f64) -> usize {
        (f64::from(self.token_budget) * ratio).floor() as usize
    }
}

/// Age bucket of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Immediate,
    Recent,
    Milestone,
}

impl Tier {
    /// Classifies an entry iteration relative to the current iteration.
    pub fn of(iteration: u32, current_iteration: u32) -> Self {
        let iteration = i64::from(iteration);
        let current = i64::from(current_iteration);
        if iteration >= current - IMMEDIATE_WINDOW {
            Tier::Immediate
        } else if iteration >= current - RECENT_WINDOW {
            Tier::Recent
        } else {
            Tier::Milestone
        }
    }

    fn retains(self, entry_type: EntryType) -> bool {
        match self {
            Tier::Immediate => true,
            Tier::Recent => matches!(entry_type, EntryType::Plan | EntryType::Result),
            Tier::Milestone => entry_type == EntryType::Result,
        }
    }
}

/// Compresses accumulated specialist history under a token budget.
#[derive(Debug, Clone, Default)]
pub struct HistoryCompressor {
    config: HistoryConfig,
}

impl HistoryCompressor {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Compresses `full_history` for the prompt of `current_iteration`.
    ///
    /// Best effort: when compression is disabled or fails for any reason the
    /// original history is returned unchanged.
    pub fn compress(&self, full_history: &[String], current_iteration: u32) -> Vec<String> {
        if !self.config.compression_enabled {
            return full_history.to_vec();
        }

        match self.try_compress(full_history, current_iteration) {
            Ok(compressed) => {
                tracing::debug!(
                    original = full_history.len(),
                    compressed = compressed.len(),
                    current_iteration,
                    "[HistoryCompressor] History compressed"
                );
                compressed
            }
            Err(e) => {
                tracing::warn!(
                    "[HistoryCompressor] Compression failed, using full history: {}",
                    e
                );
                full_history.to_vec()
            }
        }
    }

    fn try_compress(&self, full_history: &[String], current_iteration: u32) -> Result<Vec<String>> {
        self.config.validate()?;

        let mut immediate = Vec::new();
        let mut recent = Vec::new();
        let mut milestone = Vec::new();

        for (index, content) in full_history.iter().enumerate() {
            let entry = HistoryEntry::parse(content, index);
            let tier = Tier::of(entry.iteration, current_iteration);
            if !tier.retains(entry.entry_type) {
                continue;
            }
            match tier {
                Tier::Immediate => immediate.push(entry),
                Tier::Recent => recent.push(entry),
                Tier::Milestone => milestone.push(entry),
            }
        }

        let ratios = self.config.tier_ratios;
        let mut output = fill_tier(immediate, self.config.tier_budget(ratios.immediate));
        output.extend(fill_tier(recent, self.config.tier_budget(ratios.recent)));
        output.extend(fill_tier(milestone, self.config.tier_budget(ratios.milestone)));
        Ok(output)
    }
}

/// Orders a tier newest first, ties broken by original position.
fn sort_tier(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| {
        b.iteration
            .cmp(&a.iteration)
            .then(a.original_index.cmp(&b.original_index))
    });
}

fn fill_tier(mut entries: Vec<HistoryEntry>, budget: usize) -> Vec<String> {
    sort_tier(&mut entries);

    let mut used = 0usize;
    let mut kept = Vec::with_capacity(entries.len());

    for entry in entries {
        if used + entry.tokens <= budget {
            used += entry.tokens;
            kept.push(entry.content);
            continue;
        }

        if entry.is_tool_result() {
            let warning = oversized_result_warning(entry.iteration, entry.tokens);
            let warning_tokens = estimate_tokens(&warning);
            if used + warning_tokens <= budget {
                used += warning_tokens;
                kept.push(warning);
            }
        }
    }

    kept
}

fn oversized_result_warning(iteration: u32, tokens: usize) -> String {
    format!(
        "迭代 {} - ⚠️ 工具输出过大（约 {} tokens），已从历史中省略",
        iteration, tokens
    )
}
