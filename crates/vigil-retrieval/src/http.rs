//! Retriever backed by an HTTP search service.
//!
//! Sends `POST {url}` with `{"query": ..., "top_k": ...}` and accepts either a
//! bare array of items or an object with a `results` (or `documents`) array.
//! Each item needs a `content` field (`page_content` and `text` are accepted
//! as aliases) and may carry `metadata`.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vigil_llm::with_retry;

use crate::error::{Result, RetrievalError};
use crate::retriever::{ContextItem, Retriever};

/// Default number of items requested per query.
pub const DEFAULT_TOP_K: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`HttpRetriever`].
#[derive(Debug, Clone)]
pub struct HttpRetrieverConfig {
    /// Search endpoint.
    pub url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Items requested per query.
    pub top_k: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient errors.
    pub max_retries: u32,
    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl HttpRetrieverConfig {
    /// Create a config for `url` with default limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            top_k: DEFAULT_TOP_K,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the number of items requested.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Retriever
// ─────────────────────────────────────────────────────────────────────────────

/// Retriever that queries a remote search service.
pub struct HttpRetriever {
    client: Client,
    config: HttpRetrieverConfig,
}

impl HttpRetriever {
    /// Create a retriever with the given configuration.
    pub fn new(config: HttpRetrieverConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(RetrievalError::Config("search url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn handle_response(response: Response) -> Result<Vec<ContextItem>> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                RetrievalError::Unavailable(format!("HTTP {}: {}", status, message))
            } else {
                RetrievalError::Backend {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_items())
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ContextItem>> {
        if query.trim().is_empty() {
            tracing::debug!("Empty retrieval query, skipping search");
            return Ok(Vec::new());
        }

        let body = SearchRequest {
            query,
            top_k: self.config.top_k,
        };

        let mut items = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "retriever",
            || async {
                let mut builder = self
                    .client
                    .post(&self.config.url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&body);
                if let Some(ref key) = self.config.api_key {
                    builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
                }
                Self::handle_response(builder.send().await?).await
            },
        )
        .await?;

        items.truncate(self.config.top_k);
        tracing::debug!(results = items.len(), "Retrieved context");
        Ok(items)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Bare(Vec<SearchItem>),
    Wrapped {
        #[serde(alias = "documents")]
        results: Vec<SearchItem>,
    },
}

impl SearchResponse {
    fn into_items(self) -> Vec<ContextItem> {
        let items = match self {
            Self::Bare(items) => items,
            Self::Wrapped { results } => results,
        };
        items.into_iter().map(Into::into).collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(alias = "page_content", alias = "text")]
    content: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<SearchItem> for ContextItem {
    fn from(item: SearchItem) -> Self {
        ContextItem {
            content: item.content,
            metadata: item.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[{"content": "a", "metadata": {"source": "x"}}, {"text": "b"}]"#;
        let items = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].metadata["source"], "x");
        assert_eq!(items[1].content, "b");
        assert!(items[1].metadata.is_empty());
    }

    #[test]
    fn test_parse_wrapped_results() {
        let body = r#"{"results": [{"page_content": "passage"}]}"#;
        let items = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_items();
        assert_eq!(items, vec![ContextItem::new("passage")]);

        let body = r#"{"documents": []}"#;
        let items = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_items();
        assert!(items.is_empty());
    }

    #[test]
    fn test_rejects_empty_url() {
        assert!(matches!(
            HttpRetriever::new(HttpRetrieverConfig::new("  ")),
            Err(RetrievalError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_skips_network() {
        // Unroutable address: any network call would fail.
        let retriever =
            HttpRetriever::new(HttpRetrieverConfig::new("http://127.0.0.1:9/search")).unwrap();
        assert!(retriever.retrieve("   ").await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = HttpRetrieverConfig::new("http://search.local/query")
            .with_top_k(8)
            .with_api_key("k")
            .with_max_retries(1);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.max_retries, 1);
    }
}
