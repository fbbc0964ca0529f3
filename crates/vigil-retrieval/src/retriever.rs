//! Retriever trait, context items and an in-memory retriever.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Context Item
// ─────────────────────────────────────────────────────────────────────────────

/// One retrieved passage with its source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Passage text.
    pub content: String,
    /// Free-form source metadata (title, url, page, score...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ContextItem {
    /// Create an item without metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Attach one metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Concatenate item contents, separated by blank lines.
pub fn join_contents(items: &[ContextItem]) -> String {
    items
        .iter()
        .map(|item| item.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Retriever Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Turns a query string into an ordered list of context items.
///
/// An empty query or an empty result set is not an error. Transport retries
/// belong inside the implementation.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch context for `query`, most relevant first.
    async fn retrieve(&self, query: &str) -> Result<Vec<ContextItem>>;

    /// Get the name of this retriever.
    fn name(&self) -> &str;
}

/// A retriever that can be shared across tasks.
pub type SharedRetriever = Arc<dyn Retriever>;

// ─────────────────────────────────────────────────────────────────────────────
// Static Retriever
// ─────────────────────────────────────────────────────────────────────────────

/// Serves a fixed corpus.
///
/// Items sharing at least one word with the query come first, in corpus
/// order, followed by the rest; at most `top_k` are returned. Used when no
/// search service is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    items: Vec<ContextItem>,
    top_k: usize,
}

impl StaticRetriever {
    /// Create a retriever over `items` returning at most 5 per query.
    pub fn new(items: Vec<ContextItem>) -> Self {
        Self { items, top_k: 5 }
    }

    /// A retriever that never finds anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Set the maximum number of items per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn overlaps(query_words: &[String], content: &str) -> bool {
        let content = content.to_lowercase();
        query_words.iter().any(|w| content.contains(w.as_str()))
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ContextItem>> {
        let words: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .map(str::to_lowercase)
            .collect();

        let (mut matched, rest): (Vec<_>, Vec<_>) = self
            .items
            .iter()
            .cloned()
            .partition(|item| Self::overlaps(&words, &item.content));
        matched.extend(rest);
        matched.truncate(self.top_k);

        tracing::debug!(query_len = query.len(), results = matched.len(), "Static retrieval");
        Ok(matched)
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_contents() {
        let items = vec![ContextItem::new("a"), ContextItem::new("b")];
        assert_eq!(join_contents(&items), "a\n\nb");
        assert_eq!(join_contents(&[]), "");
    }

    #[test]
    fn test_context_item_metadata() {
        let item = ContextItem::new("text")
            .with_metadata("source", "guide.pdf")
            .with_metadata("page", 4);
        assert_eq!(item.metadata["source"], "guide.pdf");
        assert_eq!(item.metadata["page"], 4);
    }

    #[tokio::test]
    async fn test_empty_retriever_returns_nothing() {
        let retriever = StaticRetriever::empty();
        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
        assert!(retriever.retrieve("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_retriever_ranks_overlap_first() {
        let retriever = StaticRetriever::new(vec![
            ContextItem::new("Insulin regulates glucose."),
            ContextItem::new("Ketosis burns fat for fuel."),
            ContextItem::new("Fiber aids digestion."),
        ])
        .with_top_k(2);

        let items = retriever.retrieve("what is ketosis").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "Ketosis burns fat for fuel.");
        assert_eq!(items[1].content, "Insulin regulates glucose.");
    }
}
