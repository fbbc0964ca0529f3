//! Query and user-id validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::issue::{IssueCode, ValidationIssue, ValidationReport};

pub const DEFAULT_MIN_QUERY_CHARS: usize = 3;
pub const DEFAULT_MAX_QUERY_CHARS: usize = 5000;
pub const DEFAULT_MAX_USER_ID_CHARS: usize = 100;

/// Patterns that suggest SQL or script injection.
///
/// The event-handler pattern is anchored on a word boundary so that words
/// like `condition=` do not match.
static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(drop|delete|truncate|update|insert)\s+(table|from|into)\b",
        r"(?i)<script[^>]*>",
        r"(?i)javascript:",
        r"(?i)\bon\w+\s*=",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid injection regex"))
    .collect()
});

static USER_ID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-.@]+$").expect("valid user id regex"));

/// Structural and security checks on free-text input.
///
/// Holds only limits; every method is a pure function of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputValidator {
    pub min_query_chars: usize,
    pub max_query_chars: usize,
    pub max_user_id_chars: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self {
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
            max_user_id_chars: DEFAULT_MAX_USER_ID_CHARS,
        }
    }
}

impl InputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_bounds(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_query_chars = min_chars;
        self.max_query_chars = max_chars;
        self
    }

    pub fn with_max_user_id_chars(mut self, max_chars: usize) -> Self {
        self.max_user_id_chars = max_chars;
        self
    }

    /// Check a query.
    ///
    /// An empty query reports only `EMPTY_QUERY`. Otherwise length is measured
    /// in characters after trimming, and every failing check is reported.
    pub fn validate_query(&self, query: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        if query.is_empty() {
            report.push(ValidationIssue::new(
                "query",
                IssueCode::EmptyQuery,
                "Query cannot be empty",
            ));
            return report;
        }

        let trimmed = query.trim();
        let chars = trimmed.chars().count();

        if chars < self.min_query_chars {
            report.push(ValidationIssue::new(
                "query",
                IssueCode::QueryTooShort,
                format!("Query must be at least {} characters", self.min_query_chars),
            ));
        }
        if chars > self.max_query_chars {
            report.push(ValidationIssue::new(
                "query",
                IssueCode::QueryTooLong,
                format!("Query cannot exceed {} characters", self.max_query_chars),
            ));
        }

        if INJECTION_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
            tracing::debug!("Injection pattern matched in query");
            report.push(ValidationIssue::new(
                "query",
                IssueCode::InjectionDetected,
                "Query contains potentially harmful content",
            ));
        }

        if trimmed.contains(['\0', char::REPLACEMENT_CHARACTER]) {
            report.push(invalid_encoding());
        }

        report
    }

    /// Check raw query bytes, rejecting anything that is not UTF-8.
    pub fn validate_query_bytes(&self, bytes: &[u8]) -> ValidationReport {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.validate_query(text),
            Err(_) => {
                let mut report = ValidationReport::new();
                report.push(invalid_encoding());
                report
            }
        }
    }

    /// Check a user id: non-empty, bounded, and made of word characters,
    /// `-`, `.` and `@`.
    pub fn validate_user_id(&self, user_id: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        if user_id.is_empty() {
            report.push(ValidationIssue::new(
                "user_id",
                IssueCode::EmptyUserId,
                "User ID cannot be empty",
            ));
            return report;
        }

        let trimmed = user_id.trim();

        if trimmed.chars().count() > self.max_user_id_chars {
            report.push(ValidationIssue::new(
                "user_id",
                IssueCode::UserIdTooLong,
                format!("User ID cannot exceed {} characters", self.max_user_id_chars),
            ));
        }

        if !USER_ID_CHARS.is_match(trimmed) {
            report.push(ValidationIssue::new(
                "user_id",
                IssueCode::InvalidUserIdChars,
                "User ID contains invalid characters",
            ));
        }

        report
    }

    /// Validate a user id and query together.
    pub fn validate_request(&self, user_id: &str, query: &str) -> ValidationReport {
        let mut report = self.validate_user_id(user_id);
        report.merge(self.validate_query(query));
        report
    }
}

fn invalid_encoding() -> ValidationIssue {
    ValidationIssue::new(
        "query",
        IssueCode::InvalidEncoding,
        "Query contains invalid characters",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(report: &ValidationReport) -> Vec<IssueCode> {
        report.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_patterns_compile() {
        assert_eq!(INJECTION_PATTERNS.len(), 4);
        assert!(USER_ID_CHARS.is_match("user.name@example-1"));
    }

    #[test]
    fn test_valid_query() {
        let report = InputValidator::new().validate_query("How do I reset my password?");
        assert!(report.is_valid(), "{report:?}");
    }

    #[test]
    fn test_empty_query_short_circuits() {
        let report = InputValidator::new().validate_query("");
        assert_eq!(codes(&report), vec![IssueCode::EmptyQuery]);
    }

    #[test]
    fn test_query_length_bounds() {
        let validator = InputValidator::new();
        assert_eq!(
            codes(&validator.validate_query("  hi  ")),
            vec![IssueCode::QueryTooShort]
        );
        assert!(validator.validate_query("abc").is_valid());

        let long = "a".repeat(5001);
        assert_eq!(
            codes(&validator.validate_query(&long)),
            vec![IssueCode::QueryTooLong]
        );
        assert!(validator.validate_query(&"a".repeat(5000)).is_valid());
    }

    #[test]
    fn test_whitespace_only_query_is_too_short() {
        let report = InputValidator::new().validate_query("     ");
        assert_eq!(codes(&report), vec![IssueCode::QueryTooShort]);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let validator = InputValidator::new().with_query_bounds(3, 4);
        assert!(validator.validate_query("ééé").is_valid());
    }

    #[test]
    fn test_injection_patterns() {
        let validator = InputValidator::new();
        for query in [
            "please DROP TABLE users",
            "delete from accounts where 1=1",
            "<script>alert(1)</script>",
            "<SCRIPT src=x>",
            "click javascript:alert(1)",
            "<img onerror=alert(1)>",
            "x onclick = steal()",
        ] {
            let report = validator.validate_query(query);
            assert!(
                report.has(IssueCode::InjectionDetected),
                "expected injection for {query:?}"
            );
        }
    }

    #[test]
    fn test_benign_text_not_flagged() {
        let validator = InputValidator::new();
        for query in [
            "What is the condition=good setting?",
            "How do I update my profile from the app?",
            "Tell me about the insert key",
            "Can I delete my account?",
        ] {
            let report = validator.validate_query(query);
            assert!(report.is_valid(), "unexpected issues for {query:?}: {report:?}");
        }
    }

    #[test]
    fn test_multiple_issues_reported() {
        let validator = InputValidator::new().with_query_bounds(10, 100);
        let report = validator.validate_query("<script>");
        assert_eq!(
            codes(&report),
            vec![IssueCode::QueryTooShort, IssueCode::InjectionDetected]
        );
    }

    #[test]
    fn test_invalid_encoding() {
        let validator = InputValidator::new();
        assert!(validator
            .validate_query("bad\0byte here")
            .has(IssueCode::InvalidEncoding));
        assert!(validator
            .validate_query("bad \u{FFFD} char")
            .has(IssueCode::InvalidEncoding));

        let report = validator.validate_query_bytes(&[0x68, 0x69, 0xff, 0xfe, 0x21]);
        assert_eq!(codes(&report), vec![IssueCode::InvalidEncoding]);

        assert!(validator.validate_query_bytes(b"valid query").is_valid());
    }

    #[test]
    fn test_user_id_rules() {
        let validator = InputValidator::new();
        assert!(validator.validate_user_id("alice.smith-01@example").is_valid());
        assert!(validator.validate_user_id("user_42").is_valid());

        assert_eq!(
            codes(&validator.validate_user_id("")),
            vec![IssueCode::EmptyUserId]
        );
        assert_eq!(
            codes(&validator.validate_user_id("bob smith")),
            vec![IssueCode::InvalidUserIdChars]
        );
        assert_eq!(
            codes(&validator.validate_user_id("x;drop")),
            vec![IssueCode::InvalidUserIdChars]
        );
        assert_eq!(
            codes(&validator.validate_user_id(&"u".repeat(101))),
            vec![IssueCode::UserIdTooLong]
        );
    }

    #[test]
    fn test_validate_request_merges() {
        let report = InputValidator::new().validate_request("", "");
        assert_eq!(
            codes(&report),
            vec![IssueCode::EmptyUserId, IssueCode::EmptyQuery]
        );
    }
}
