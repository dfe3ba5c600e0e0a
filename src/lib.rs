//! # Chroma Local Search
//!
//! Index a local directory tree into a Chroma collection and query it by
//! semantic similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Extractor  │──▶│  Ingestor   │──▶│  Collection  │
//! │ walk+filter │   │   batches   │   │ Chroma/Memory│
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                                       ┌────▼─────┐
//!                                       │  query   │
//!                                       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cls index ./notes             # walk, filter, and add files
//! cls query "deployment steps"  # top 5 matches
//! cls delete                    # drop the collection
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, metadata, query results |
//! | [`filter`] | Composable file filters |
//! | [`connector_fs`] | Filesystem walk and document loading |
//! | [`batch`] | Bounded-concurrency batch submission |
//! | [`store`] | Vector-store traits and backends |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`ingest`] | `index` command |
//! | [`search`] | `query` command |
//! | [`delete`] | `delete` command |
//! | [`progress`] | Index progress reporting |
//! | [`error`] | Typed errors |

pub mod batch;
pub mod config;
pub mod connector_fs;
pub mod delete;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod search;
pub mod store;
