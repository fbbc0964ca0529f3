//! Mem0 hosted memory API client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vigil_llm::with_retry;

use crate::error::{MemoryError, Result};
use crate::store::{Exchange, MemoryRecord, MemoryStore, Metadata, Turn};

/// Default Mem0 API base URL.
pub const DEFAULT_MEM0_BASE: &str = "https://api.mem0.ai";

/// Environment variable holding the Mem0 API key.
pub const MEM0_API_KEY_ENV: &str = "MEM0_API_KEY";

const OUTPUT_FORMAT: &str = "v1.1";

/// Configuration for [`Mem0Memory`].
#[derive(Debug, Clone)]
pub struct Mem0Config {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Mem0Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_MEM0_BASE.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Read the key from `MEM0_API_KEY`. `None` when unset or blank.
    pub fn from_env() -> Option<Self> {
        std::env::var(MEM0_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Memory store backed by the Mem0 REST API.
pub struct Mem0Memory {
    client: Client,
    config: Mem0Config,
}

impl Mem0Memory {
    pub fn new(config: Mem0Config) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MemoryError::Config("Mem0 API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MemoryError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn memories_url(&self) -> String {
        format!("{}/v1/memories/", self.config.base_url)
    }

    fn search_url(&self) -> String {
        format!("{}/v1/memories/search/", self.config.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::AUTHORIZATION, format!("Token {}", self.config.api_key))
            .header(header::CONTENT_TYPE, "application/json")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(if status.is_server_error() {
            MemoryError::Unavailable(format!("HTTP {}: {}", status, message))
        } else {
            MemoryError::Api {
                status: status.as_u16(),
                message,
            }
        })
    }
}

#[async_trait]
impl MemoryStore for Mem0Memory {
    async fn store(&self, user_id: &str, exchange: &Exchange, metadata: Metadata) -> Result<()> {
        let body = AddRequest {
            messages: exchange.turns(),
            user_id,
            metadata,
            output_format: OUTPUT_FORMAT,
        };
        let url = self.memories_url();

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "mem0",
            || async {
                let response = self.authorized(self.client.post(&url)).json(&body).send().await?;
                Self::check(response).await.map(drop)
            },
        )
        .await?;

        tracing::debug!(user_id = user_id, "Stored interaction");
        Ok(())
    }

    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let body = SearchRequest {
            query,
            user_id,
            limit,
            output_format: OUTPUT_FORMAT,
        };
        let url = self.search_url();

        let parsed: SearchResponse = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "mem0",
            || async {
                let response = self.authorized(self.client.post(&url)).json(&body).send().await?;
                let text = Self::check(response).await?.text().await?;
                Ok::<_, MemoryError>(serde_json::from_str(&text)?)
            },
        )
        .await?;

        let mut records = parsed.into_records();
        records.truncate(limit);
        tracing::debug!(user_id = user_id, hits = records.len(), "Searched memories");
        Ok(records)
    }

    fn name(&self) -> &str {
        "mem0"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    messages: Vec<Turn>,
    user_id: &'a str,
    metadata: Metadata,
    output_format: &'static str,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    user_id: &'a str,
    limit: usize,
    output_format: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Bare(Vec<MemoryRecord>),
    Wrapped { results: Vec<MemoryRecord> },
}

impl SearchResponse {
    fn into_records(self) -> Vec<MemoryRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { results: records } => records,
        }
    }
}
