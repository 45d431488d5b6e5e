//! Heuristic token estimation.

use std::sync::OnceLock;

use regex::Regex;

const TOKENS_PER_WORD: f64 = 1.3;

static WORD_RE: OnceLock<Regex> = OnceLock::new();

fn word_re() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]+").expect("static regex"))
}

/// Estimate how many tokens `text` costs.
///
/// Counts runs of `[A-Za-z0-9_-]` and scales by 1.3. Non-empty input always
/// costs at least one token, so punctuation-only text is never free.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let words = word_re().find_iter(text).count();
    let estimate = (words as f64 * TOKENS_PER_WORD).ceil() as u32;
    estimate.max(1)
}
