//! Non-failing input cleanup.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub const DEFAULT_LOG_PREVIEW_CHARS: usize = 200;

fn strip<'a>(re: &Regex, text: Cow<'a, str>, with: &str) -> Cow<'a, str> {
    if re.is_match(&text) {
        Cow::Owned(re.replace_all(&text, with).into_owned())
    } else {
        text
    }
}

/// Remove markup tags and `javascript:` schemes, then collapse whitespace
/// runs to single spaces. Never fails.
pub fn sanitize_query(query: &str) -> String {
    let text = Cow::Borrowed(query.trim());
    let text = strip(&TAG, text, "");
    let text = strip(&JAVASCRIPT_SCHEME, text, "");
    let text = strip(&WHITESPACE, text, " ");
    text.trim().to_string()
}

/// One-line preview of user text for log fields.
///
/// Truncates to `max_chars` characters (appending `...`) and drops line breaks.
pub fn sanitize_for_logging(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        preview.push_str("...");
    }
    preview.replace('\n', " ").replace('\r', "")
}
