//! Deterministic text cleanup applied to every page.

use super::patterns::{
    CONTROL_CHARS, DOUBLE_QUOTES, SINGLE_QUOTES, SPACE_AFTER_PUNCT, SPACE_BEFORE_PUNCT, WHITESPACE,
};

/// Normalize extracted text.
///
/// Strips control characters, straightens smart quotes, collapses whitespace
/// runs into single spaces, removes spaces before `, . ! ? ; :`, leaves exactly
/// one space after them, and trims. `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Controls go first so removing one can never leave two spaces behind
    let text = CONTROL_CHARS.replace_all(text, "");
    let text = DOUBLE_QUOTES.replace_all(&text, "\"");
    let text = SINGLE_QUOTES.replace_all(&text, "'");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = SPACE_AFTER_PUNCT.replace_all(&text, "$1 ");

    text.trim().to_string()
}

/// Count whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Length in characters, which is what the extraction thresholds compare.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
