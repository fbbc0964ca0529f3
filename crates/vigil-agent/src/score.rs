//! Evaluator output parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Score used when evaluator output contains no number.
pub const FALLBACK_SCORE: f64 = 0.5;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*").expect("valid number regex"));

/// Turn evaluator text into a score in `[0, 1]`.
///
/// Tries the whole trimmed text as a number, then the first number-shaped
/// substring, then falls back to 0.5. Never fails.
pub fn parse_score(raw: &str) -> f64 {
    let trimmed = raw.trim();

    let direct = trimmed.parse::<f64>().ok().filter(|v| v.is_finite());
    let score = direct
        .or_else(|| {
            NUMBER
                .find(trimmed)
                .and_then(|m| m.as_str().parse::<f64>().ok())
        })
        .unwrap_or_else(|| {
            tracing::warn!(
                raw = %truncate(trimmed, 80),
                fallback = FALLBACK_SCORE,
                "Could not parse evaluator score"
            );
            FALLBACK_SCORE
        });

    score.clamp(0.0, 1.0)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
