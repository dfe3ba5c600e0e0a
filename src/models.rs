//! Core data models used throughout the indexer.
//!
//! These types represent the documents submitted to a collection and the
//! results read back from it.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata map attached to each stored document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// File-level metadata stored next to each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub path: String,
    pub size: u64,
}

impl FileMetadata {
    pub fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("filename".into(), self.filename.clone().into());
        map.insert("path".into(), self.path.clone().into());
        map.insert("size".into(), self.size.into());
        map
    }
}

/// A file's content ready to be added to a collection.
#[derive(Debug, Clone)]
pub struct Document {
    /// Normalized absolute path of the source file.
    pub id: String,
    pub text: String,
    pub metadata: FileMetadata,
}

impl Document {
    /// Build a document for `path`. The id is derived from the path, so the
    /// same file always maps to the same stored document.
    pub fn from_file(path: &Path, text: String, size: u64) -> Self {
        let path_str = path.to_string_lossy().to_string();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: document_id(path),
            text,
            metadata: FileMetadata {
                filename,
                path: path_str,
                size,
            },
        }
    }
}

/// Stable document id for a path.
pub fn document_id(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// A single search hit, flattened from the store's grouped response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub filename: String,
    pub path: String,
    pub content: String,
}
