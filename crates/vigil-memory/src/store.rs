//! The memory collaborator trait and in-process implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Free-form metadata attached to a stored exchange.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One user message and the answer it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

impl Exchange {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    /// The exchange as chat turns, user first.
    pub fn turns(&self) -> Vec<Turn> {
        vec![
            Turn::new("user", self.user.clone()),
            Turn::new("assistant", self.assistant.clone()),
        ]
    }
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default = "unknown_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn unknown_role() -> String {
    "unknown".to_string()
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Body of a remembered item: either a distilled fact or raw turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryContent {
    Text(String),
    Turns(Vec<Turn>),
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub memory: MemoryContent,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl MemoryRecord {
    pub fn text(memory: impl Into<String>) -> Self {
        Self {
            id: None,
            memory: MemoryContent::Text(memory.into()),
            score: None,
            metadata: None,
        }
    }

    pub fn from_exchange(exchange: &Exchange) -> Self {
        Self {
            id: None,
            memory: MemoryContent::Turns(exchange.turns()),
            score: None,
            metadata: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Long-term conversation memory keyed by user.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist one exchange for `user_id`.
    async fn store(&self, user_id: &str, exchange: &Exchange, metadata: Metadata) -> Result<()>;

    /// Up to `limit` prior items relevant to `query`.
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>>;

    fn name(&self) -> &str;

    /// False for stores that discard everything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Shared handle to a memory store.
pub type SharedMemory = Arc<dyn MemoryStore>;

// ─────────────────────────────────────────────────────────────────────────────
// NoMemory
// ─────────────────────────────────────────────────────────────────────────────

/// Memory store used when no credential is configured. Stores nothing and
/// finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemory;

#[async_trait]
impl MemoryStore for NoMemory {
    async fn store(&self, _user_id: &str, _exchange: &Exchange, _metadata: Metadata) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _user_id: &str, _query: &str, _limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordingMemory
// ─────────────────────────────────────────────────────────────────────────────

/// A stored exchange as seen by [`RecordingMemory`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredExchange {
    pub user_id: String,
    pub exchange: Exchange,
    pub metadata: Metadata,
}

/// In-process store that keeps every exchange; useful for tests.
///
/// `search` returns the user's most recent exchanges, newest first.
#[derive(Debug, Default, Clone)]
pub struct RecordingMemory {
    stored: Arc<Mutex<Vec<StoredExchange>>>,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything stored so far, oldest first.
    pub fn stored(&self) -> Vec<StoredExchange> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl MemoryStore for RecordingMemory {
    async fn store(&self, user_id: &str, exchange: &Exchange, metadata: Metadata) -> Result<()> {
        self.stored.lock().push(StoredExchange {
            user_id: user_id.to_string(),
            exchange: exchange.clone(),
            metadata,
        });
        Ok(())
    }

    async fn search(&self, user_id: &str, _query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .stored
            .lock()
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .take(limit)
            .map(|s| MemoryRecord::from_exchange(&s.exchange))
            .collect())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_memory_is_a_no_op() {
        let memory = NoMemory;
        memory
            .store("u1", &Exchange::new("hi", "hello"), Metadata::new())
            .await
            .unwrap();
        assert!(memory.search("u1", "hi", 5).await.unwrap().is_empty());
        assert!(!memory.is_enabled());
    }

    #[tokio::test]
    async fn test_recording_memory_scopes_by_user() {
        let memory = RecordingMemory::new();
        memory
            .store("alice", &Exchange::new("q1", "a1"), Metadata::new())
            .await
            .unwrap();
        memory
            .store("bob", &Exchange::new("q2", "a2"), Metadata::new())
            .await
            .unwrap();
        memory
            .store("alice", &Exchange::new("q3", "a3"), Metadata::new())
            .await
            .unwrap();

        let hits = memory.search("alice", "anything", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].memory,
            MemoryContent::Turns(Exchange::new("q3", "a3").turns())
        );

        let limited = memory.search("alice", "anything", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(memory.stored().len(), 3);
    }

    #[test]
    fn test_record_accepts_text_or_turns() {
        let text: MemoryRecord =
            serde_json::from_str(r#"{"id": "m1", "memory": "Prefers vegetarian meals", "score": 0.9}"#)
                .unwrap();
        assert_eq!(
            text.memory,
            MemoryContent::Text("Prefers vegetarian meals".to_string())
        );
        assert_eq!(text.score, Some(0.9));

        let turns: MemoryRecord = serde_json::from_str(
            r#"{"memory": [{"role": "user", "content": "hi"}, {"content": "no role"}]}"#,
        )
        .unwrap();
        match turns.memory {
            MemoryContent::Turns(t) => {
                assert_eq!(t.len(), 2);
                assert_eq!(t[1].role, "unknown");
            }
            other => panic!("expected turns, got {other:?}"),
        }
    }
}
