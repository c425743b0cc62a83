//! Specialist history handling.
//!
//! - `tokens`: the shared token estimate
//! - `entry`: recovering iteration/type from flat history strings
//! - `compressor`: tiered compression under a token budget

mod compressor;
mod entry;
mod tokens;

pub use compressor::{DEFAULT_TOKEN_BUDGET, HistoryCompressor, HistoryConfig, Tier, TierRatios};
pub use entry::{
    EntryType, HistoryEntry, TOOL_RESULT_MARKER, parse_entry_type, parse_iteration,
};
pub use tokens::{estimate_tokens, is_cjk};
