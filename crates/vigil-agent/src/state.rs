//! Per-request controller state.

use serde::Serialize;
use vigil_retrieval::{ContextItem, join_contents};

/// Everything one controller run knows about its request.
///
/// Owned by a single run and passed by value through each step, which
/// returns the updated record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestState {
    /// The user's question, never modified.
    pub query: String,
    /// Search query produced by the last expansion.
    pub expanded_query: String,
    /// Items from the last retrieval, replaced wholesale.
    pub context: Vec<ContextItem>,
    /// Latest answer.
    pub response: String,
    /// Latest groundedness score in `[0, 1]`.
    pub groundedness_score: f64,
    /// Latest precision score in `[0, 1]`.
    pub precision_score: f64,
    /// Groundedness scoring calls so far.
    pub groundedness_loop_count: u32,
    /// Precision scoring calls so far.
    pub precision_loop_count: u32,
    /// Suggestions for the next answer.
    pub response_feedback: String,
    /// Suggestions for the next query expansion.
    pub query_feedback: String,
    /// Cap on each scoring loop.
    pub max_iterations: u32,
    /// Rendered prior interactions for this user.
    pub history: String,
    /// Generator tokens consumed by this run.
    pub tokens_used: u64,
}

impl RequestState {
    pub fn new(query: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            query: query.into(),
            expanded_query: String::new(),
            context: Vec::new(),
            response: String::new(),
            groundedness_score: 0.0,
            precision_score: 0.0,
            groundedness_loop_count: 0,
            precision_loop_count: 0,
            response_feedback: String::new(),
            query_feedback: String::new(),
            max_iterations,
            history: String::new(),
            tokens_used: 0,
        }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.history = history.into();
        self
    }

    /// Context contents joined by blank lines.
    pub fn context_text(&self) -> String {
        join_contents(&self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_blank() {
        let state = RequestState::new("what is ketosis?", 3);
        assert_eq!(state.query, "what is ketosis?");
        assert!(state.expanded_query.is_empty());
        assert!(state.context.is_empty());
        assert_eq!(state.groundedness_loop_count, 0);
        assert_eq!(state.precision_loop_count, 0);
        assert_eq!(state.max_iterations, 3);
        assert_eq!(state.tokens_used, 0);
    }

    #[test]
    fn test_context_text_joins_items() {
        let mut state = RequestState::new("q", 3);
        state.context = vec![ContextItem::new("alpha"), ContextItem::new("beta")];
        assert_eq!(state.context_text(), "alpha\n\nbeta");
    }
}
