//! Validation findings.

use serde::Serialize;

/// Machine-readable reason an input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    EmptyQuery,
    QueryTooShort,
    QueryTooLong,
    InjectionDetected,
    InvalidEncoding,
    EmptyUserId,
    UserIdTooLong,
    InvalidUserIdChars,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::QueryTooShort => "QUERY_TOO_SHORT",
            Self::QueryTooLong => "QUERY_TOO_LONG",
            Self::InjectionDetected => "INJECTION_DETECTED",
            Self::InvalidEncoding => "INVALID_ENCODING",
            Self::EmptyUserId => "EMPTY_USER_ID",
            Self::UserIdTooLong => "USER_ID_TOO_LONG",
            Self::InvalidUserIdChars => "INVALID_USER_ID_CHARS",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field name (`query` or `user_id`).
    pub field: &'static str,
    /// User-facing explanation.
    pub message: String,
    /// Stable code.
    pub code: IssueCode,
}

impl ValidationIssue {
    pub fn new(field: &'static str, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
            code,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every issue found by one validation call. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Append another report's issues.
    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// Issue messages joined with `"; "`.
    pub fn messages(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok(())` when valid, otherwise the report as an error.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationError { report: self })
        }
    }
}

/// Rejected input.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid input: {}", report.messages())]
pub struct ValidationError {
    pub report: ValidationReport,
}
