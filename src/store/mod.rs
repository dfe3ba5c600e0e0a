//! Vector-store boundary.
//!
//! The [`StoreClient`] and [`Collection`] traits are the only contract the
//! indexer consumes. Embedding, ranking and persistence happen behind them.
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`chroma::ChromaClient`] | Chroma HTTP API v2 with client-side Ollama embeddings |
//! | [`memory::MemoryClient`] | In-process store for tests |
//!
//! Implementations must be `Send + Sync`: batch workers share one collection
//! handle concurrently.

pub mod chroma;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::Metadata;

/// Raw grouped query response, one group per query text.
///
/// Mirrors Chroma's wire shape; any group may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

/// Connection to a vector store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn get_or_create_collection(&self, name: &str)
        -> Result<Arc<dyn Collection>, StoreError>;

    /// Fails with [`StoreError::NotFound`] if the collection does not exist.
    async fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError>;

    /// Fails with [`StoreError::NotFound`] if the collection does not exist.
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;
}

/// A named partition of documents inside a store.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Add one batch. The three slices are parallel and of equal length.
    async fn add(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<(), StoreError>;

    /// Return up to `n` matches for `text`, most relevant first.
    async fn query(&self, text: &str, n: usize) -> Result<QueryResponse, StoreError>;
}
