use super::AppContext;
use anyhow::{Context, Result};
use srsw_core::history::{HistoryCompressor, estimate_tokens};
use std::path::Path;

/// Reads a JSON array of history strings and prints the compressed array.
pub fn run(ctx: &AppContext, current_iteration: u32, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let history: Vec<String> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of strings", file.display()))?;

    let compressed = compress(ctx, &history, current_iteration);
    println!("{}", serde_json::to_string_pretty(&compressed)?);

    let tokens = |entries: &[String]| entries.iter().map(|e| estimate_tokens(e)).sum::<usize>();
    tracing::info!(
        "[HistoryCompressor] {} entries ({} tokens) -> {} entries ({} tokens)",
        history.len(),
        tokens(&history),
        compressed.len(),
        tokens(&compressed)
    );
    Ok(())
}

fn compress(ctx: &AppContext, history: &[String], current_iteration: u32) -> Vec<String> {
    HistoryCompressor::new(ctx.config.iteration.history()).compress(history, current_iteration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use tempfile::TempDir;

    #[test]
    fn test_recent_entries_survive() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        let history = vec![
            "迭代 1 - 用户回复:\nuse English".to_string(),
            "迭代 9 - AI计划:\nwrite FR".to_string(),
            "迭代 10 - 工具结果:\nok".to_string(),
        ];

        let compressed = compress(&ctx, &history, 10);

        assert!(compressed.contains(&history[1]));
        assert!(compressed.contains(&history[2]));
        assert!(!compressed.contains(&history[0]));
    }

    #[test]
    fn test_rejects_non_array_file() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir);
        let file = temp_dir.path().join("history.json");
        std::fs::write(&file, r#"{"not":"an array"}"#).unwrap();

        assert!(run(&ctx, 3, &file).is_err());
    }
}
