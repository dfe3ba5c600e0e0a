use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::batch::BatchOptions;
use crate::filter::FilterOptions;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            collection: default_collection(),
            tenant: default_tenant(),
            database: default_database(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_collection() -> String {
    "files".to_string()
}
fn default_tenant() -> String {
    "default_tenant".to_string()
}
fn default_database() -> String {
    "default_database".to_string()
}
fn default_store_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_hidden: true,
            ignore_patterns: Vec::new(),
            respect_gitignore: true,
            follow_symlinks: false,
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    100
}
fn default_max_concurrency() -> usize {
    50
}

fn default_extensions() -> Vec<String> {
    [
        "txt", "md", "go", "py", "js", "ts", "json", "yaml", "yml", "xml", "html", "css", "sh",
        "rs", "java", "c", "cpp", "h", "hpp", "sql", "dockerfile", "toml", "ini", "cfg", "conf",
        "nix",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl IndexConfig {
    /// Filter options for a walk rooted at `root`.
    pub fn filter_options(&self, root: &Path) -> FilterOptions {
        let gitignore_patterns = if self.respect_gitignore && root.is_dir() {
            crate::filter::read_gitignore(root)
        } else {
            Vec::new()
        };
        FilterOptions {
            extensions: self.extensions.clone(),
            ignore_hidden: self.ignore_hidden,
            ignore_patterns: self.ignore_patterns.clone(),
            gitignore_patterns,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_results")]
    pub results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            results: default_results(),
        }
    }
}

fn default_results() -> usize {
    5
}

impl Config {
    /// Check every setting that would otherwise fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            bail!("store.url must not be empty");
        }
        if self.embedding.url.trim().is_empty() {
            bail!("embedding.url must not be empty");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        validate_collection_name(&self.store.collection)?;

        if self.index.batch_size == 0 {
            bail!("index.batch_size must be > 0");
        }
        if self.index.max_concurrency == 0 {
            bail!("index.max_concurrency must be > 0");
        }
        if self.query.results == 0 {
            bail!("query.results must be >= 1");
        }
        Ok(())
    }
}

/// Collection names: 3-512 characters from `[A-Za-z0-9._-]`, starting and
/// ending with an alphanumeric character, without `..`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(3..=512).contains(&len) {
        bail!(
            "invalid collection name '{}': must be 3-512 characters long",
            name
        );
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        bail!(
            "invalid collection name '{}': only [A-Za-z0-9._-] allowed",
            name
        );
    }
    let first = name.chars().next().unwrap_or('.');
    let last = name.chars().last().unwrap_or('.');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        bail!(
            "invalid collection name '{}': must start and end with a letter or digit",
            name
        );
    }
    if name.contains("..") {
        bail!(
            "invalid collection name '{}': must not contain '..'",
            name
        );
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
