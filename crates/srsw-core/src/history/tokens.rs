//! Token estimation heuristic.
//!
//! Every budget comparison in the crate goes through [`estimate_tokens`]; tier
//! fill decisions are only reproducible if the same estimate is used everywhere.

const NON_CJK_WORD_WEIGHT: f64 = 1.3;

/// Returns true for CJK unified ideographs (including extension A and the
/// compatibility block).
pub fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}'
    )
}

/// Estimates the token count of `text`.
///
/// `ceil(cjk_chars + non_cjk_words * 1.3)`, where a non-CJK word is a
/// whitespace-delimited token that still has characters left after removing
/// its CJK characters.
pub fn estimate_tokens(text: &str) -> usize {
    let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
    let non_cjk_words = text
        .split_whitespace()
        .filter(|word| word.chars().any(|c| !is_cjk(c)))
        .count();

    (cjk_chars as f64 + non_cjk_words as f64 * NON_CJK_WORD_WEIGHT).ceil() as usize
}
