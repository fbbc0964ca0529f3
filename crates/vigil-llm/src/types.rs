//! Request and response types for text generation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────────────────
// Generation Request
// ─────────────────────────────────────────────────────────────────────────────

/// A single prompt for a [`Generator`](crate::Generator).
///
/// The user prompt is a template: `{name}` placeholders are filled from
/// `variables` when the request is rendered. Placeholders without a matching
/// variable are left verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// What the call is for (e.g. `score_groundedness`). Used in logs and by fakes.
    pub purpose: String,
    /// System instruction.
    pub system: String,
    /// User prompt template.
    pub user: String,
    /// Values substituted into the user template.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a request with a purpose label, system instruction and user template.
    pub fn new(
        purpose: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            system: system.into(),
            user: user.into(),
            variables: BTreeMap::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Bind a template variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The user prompt with all known variables substituted.
    pub fn rendered_user(&self) -> String {
        render_template(&self.user, &self.variables)
    }
}

/// Substitute `{name}` placeholders in a single pass.
///
/// Substituted values are never re-scanned, so a value containing braces
/// cannot pull in another variable.
pub fn render_template(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let name = close.map(|c| &after[..c]);

        match (close, name.and_then(|n| variables.get(n))) {
            (Some(c), Some(value)) => {
                out.push_str(value);
                rest = &after[c + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Result
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Completion tokens.
    pub output_tokens: u32,
}

impl Usage {
    /// Create a usage record.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Prompt plus completion tokens.
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Text produced by a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Token usage.
    pub usage: Usage,
}

impl Generation {
    /// Create a generation result.
    pub fn new(text: impl Into<String>, model: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_variables() {
        let request = GenerationRequest::new("craft", "sys", "Query: {query}\nContext: {context}")
            .with_var("query", "what is ketosis?")
            .with_var("context", "Ketosis is a metabolic state.");

        assert_eq!(
            request.rendered_user(),
            "Query: what is ketosis?\nContext: Ketosis is a metabolic state."
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = BTreeMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(render_template("{a} {b} {", &vars), "1 {b} {");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let vars = BTreeMap::from([
            ("a".to_string(), "{b}".to_string()),
            ("b".to_string(), "oops".to_string()),
        ]);
        assert_eq!(render_template("{a}", &vars), "{b}");
    }

    #[test]
    fn test_render_handles_json_like_text() {
        let vars = BTreeMap::from([("x".to_string(), "y".to_string())]);
        assert_eq!(render_template("{\"k\": {x}}", &vars), "{\"k\": y}");
    }

    #[test]
    fn test_usage_total() {
        assert_eq!(Usage::new(10, 20).total(), 30);
        assert_eq!(Usage::default().total(), 0);
    }
}
