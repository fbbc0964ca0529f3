//! Input validation for Vigil.
//!
//! Validation can reject input and reports every problem it finds as a
//! [`ValidationIssue`]. Sanitization never fails; it only cleans text.

pub mod issue;
pub mod sanitize;
pub mod validator;

pub use issue::{IssueCode, ValidationError, ValidationIssue, ValidationReport};
pub use sanitize::{DEFAULT_LOG_PREVIEW_CHARS, sanitize_for_logging, sanitize_query};
pub use validator::{
    DEFAULT_MAX_QUERY_CHARS, DEFAULT_MAX_USER_ID_CHARS, DEFAULT_MIN_QUERY_CHARS, InputValidator,
};
