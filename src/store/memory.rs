//! In-memory [`StoreClient`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Queries rank
//! documents by how many query terms they contain; documents with no
//! matching term are not returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Metadata;

use super::{Collection, QueryResponse, StoreClient};

struct StoredDoc {
    id: String,
    text: String,
    metadata: Metadata,
}

/// In-memory store holding any number of named collections.
#[derive(Default)]
pub struct MemoryClient {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed handle to a collection, for inspecting its contents in tests.
    pub fn collection(&self, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl StoreClient for MemoryClient {
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Collection>, StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let coll = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone();
        Ok(coll)
    }

    async fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError> {
        match self.collection(name) {
            Some(coll) => Ok(coll),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        match collections.remove(name) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

/// A single in-memory collection. Adding an existing id replaces it.
pub struct MemoryCollection {
    name: String,
    docs: RwLock<Vec<StoredDoc>>,
    add_calls: AtomicUsize,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            docs: RwLock::new(Vec::new()),
            add_calls: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `add` calls received so far.
    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }
}

fn score(text: &str, terms: &[String]) -> usize {
    let text = text.to_lowercase();
    terms.iter().filter(|t| text.contains(t.as_str())).count()
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<(), StoreError> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(StoreError::Api {
                status: 400,
                body: format!(
                    "mismatched batch lengths: {} ids, {} texts, {} metadatas",
                    ids.len(),
                    texts.len(),
                    metadatas.len()
                ),
            });
        }
        self.add_calls.fetch_add(1, Ordering::SeqCst);

        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        for ((id, text), metadata) in ids.iter().zip(texts).zip(metadatas) {
            docs.retain(|d| &d.id != id);
            docs.push(StoredDoc {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
            });
        }
        Ok(())
    }

    async fn query(&self, text: &str, n: usize) -> Result<QueryResponse, StoreError> {
        let terms: Vec<String> = text.split_whitespace().map(|t| t.to_lowercase()).collect();
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());

        let mut scored: Vec<(usize, &StoredDoc)> = docs
            .iter()
            .map(|d| (score(&d.text, &terms), d))
            .filter(|(s, _)| *s > 0)
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(n);

        let max = terms.len().max(1) as f32;
        Ok(QueryResponse {
            ids: vec![scored.iter().map(|(_, d)| d.id.clone()).collect()],
            documents: Some(vec![scored
                .iter()
                .map(|(_, d)| Some(d.text.clone()))
                .collect()]),
            metadatas: Some(vec![scored
                .iter()
                .map(|(_, d)| Some(d.metadata.clone()))
                .collect()]),
            distances: Some(vec![scored
                .iter()
                .map(|(s, _)| Some(1.0 - *s as f32 / max))
                .collect()]),
        })
    }
}
