//! Conversation memory for Vigil.
//!
//! The [`MemoryStore`] trait stores answered exchanges per user and finds
//! relevant ones for later prompts. Memory is optional: [`NoMemory`] stands
//! in when no credential is configured, so a missing key degrades to a no-op
//! rather than a failure.

pub mod error;
pub mod history;
pub mod mem0;
pub mod store;

pub use error::{MemoryError, Result};
pub use history::{NO_HISTORY, format_history};
pub use mem0::{DEFAULT_MEM0_BASE, MEM0_API_KEY_ENV, Mem0Config, Mem0Memory};
pub use store::{
    Exchange, MemoryContent, MemoryRecord, MemoryStore, Metadata, NoMemory, RecordingMemory,
    SharedMemory, StoredExchange, Turn,
};
