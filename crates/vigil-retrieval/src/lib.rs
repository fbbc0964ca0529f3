//! Context retrieval collaborators for Vigil.
//!
//! Ingestion, chunking and embedding live elsewhere; this crate only turns a
//! query into an ordered list of [`ContextItem`]s through the [`Retriever`]
//! trait.

pub mod error;
pub mod http;
pub mod retriever;

pub use error::{Result, RetrievalError};
pub use http::{HttpRetriever, HttpRetrieverConfig};
pub use retriever::{ContextItem, Retriever, SharedRetriever, StaticRetriever, join_contents};
