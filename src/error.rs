//! Typed errors for the extraction pipeline, the store boundary, and the
//! batch scheduler.
//!
//! Command-level code wraps these in [`anyhow::Error`]; the typed variants
//! exist so callers (and tests) can tell a missing collection from an
//! unreachable service or a bad filter pattern.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while building an [`Extractor`](crate::connector_fs::Extractor)
/// or walking its root.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A filter option could not be compiled (bad regex, bad glob).
    #[error("invalid filter configuration: {0}")]
    Config(String),

    /// The walk root does not exist or cannot be resolved.
    #[error("cannot resolve root {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be read during the walk. Fatal for the walk.
    #[error("error walking directory tree: {0}")]
    Traversal(#[from] walkdir::Error),
}

/// Failures reported by a [`StoreClient`](crate::store::StoreClient) or
/// [`Collection`](crate::store::Collection).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection not found: {0}")]
    NotFound(String),

    /// The store or the embedding service could not be reached.
    #[error("service unavailable at {url}: {message}")]
    Unavailable { url: String, message: String },

    #[error("store request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid response from store: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// True when retrying other batches against the same service is pointless.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Failures from the batch scheduler.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Rejected before any batch was dispatched.
    #[error("invalid ingestion input: {0}")]
    Config(String),

    /// A single batch's add call failed; the whole batch counts as not ingested.
    #[error("batch {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: StoreError,
    },

    /// A batch task panicked or was aborted.
    #[error("batch worker aborted: {0}")]
    Worker(String),
}
