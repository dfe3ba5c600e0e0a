//! Bounded-concurrency batch submission.
//!
//! [`Ingestor`] splits its input into consecutive batches of at most
//! `batch_size` items and calls [`Collection::add`] once per batch, keeping at
//! most `max_concurrency` batches in flight. Every dispatched batch runs to
//! completion; the first failure (in completion order) is reported in the
//! [`IngestionResult`] and the remaining ones are logged.
//!
//! New dispatches stop early when the cancellation token fires or when a
//! batch reports the service as unavailable. Batches already in flight are
//! never interrupted.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{IngestError, StoreError};
use crate::models::{document_id, Document, Metadata};
use crate::progress::{IndexProgressEvent, IndexProgressReporter, NoProgress};
use crate::store::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrency: 50,
        }
    }
}

/// Aggregate outcome of one submission.
#[derive(Debug, Default)]
pub struct IngestionResult {
    /// Items belonging to batches whose add call succeeded.
    pub ingested: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    /// First failure by completion order.
    pub error: Option<IngestError>,
    /// Dispatch stopped before every batch was sent.
    pub stopped_early: bool,
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.stopped_early
    }
}

struct Entry {
    id: String,
    text: String,
    metadata: Metadata,
}

/// Submits batches to one collection under a concurrency cap.
pub struct Ingestor {
    collection: Arc<dyn Collection>,
    options: BatchOptions,
    cancel: CancellationToken,
    progress: Arc<dyn IndexProgressReporter>,
}

impl Ingestor {
    pub fn new(collection: Arc<dyn Collection>, options: BatchOptions) -> Self {
        Self {
            collection,
            options,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Stop dispatching new batches once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, reporter: Arc<dyn IndexProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    /// Submit already-loaded documents.
    pub async fn submit(&self, documents: Vec<Document>) -> Result<IngestionResult, IngestError> {
        let entries = documents
            .into_iter()
            .map(|doc| Entry {
                metadata: doc.metadata.to_metadata(),
                id: doc.id,
                text: doc.text,
            })
            .collect();
        self.submit_entries(entries).await
    }

    /// Submit parallel lists. Lists of differing lengths are rejected before
    /// anything is dispatched.
    pub async fn submit_parallel(
        &self,
        ids: Vec<String>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<IngestionResult, IngestError> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(IngestError::Config(format!(
                "mismatched input lengths: {} ids, {} texts, {} metadatas",
                ids.len(),
                texts.len(),
                metadatas.len()
            )));
        }
        let entries = ids
            .into_iter()
            .zip(texts)
            .zip(metadatas)
            .map(|((id, text), metadata)| Entry { id, text, metadata })
            .collect();
        self.submit_entries(entries).await
    }

    /// Submit files by path. Each batch reads its own files; an unreadable
    /// file is left out of its batch with a warning.
    pub async fn submit_paths(&self, paths: Vec<PathBuf>) -> Result<IngestionResult, IngestError> {
        self.check_options()?;
        check_ids(paths.iter().map(|p| document_id(p)))?;

        let batches = partition(paths, self.options.batch_size);
        Ok(self
            .dispatch(batches, |collection, batch| async move {
                let mut ids = Vec::with_capacity(batch.len());
                let mut texts = Vec::with_capacity(batch.len());
                let mut metadatas = Vec::with_capacity(batch.len());

                for path in batch {
                    let bytes = match tokio::fs::read(&path).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "could not read file");
                            continue;
                        }
                    };
                    let doc = Document::from_file(
                        &path,
                        String::from_utf8_lossy(&bytes).into_owned(),
                        bytes.len() as u64,
                    );
                    metadatas.push(doc.metadata.to_metadata());
                    ids.push(doc.id);
                    texts.push(doc.text);
                }

                if ids.is_empty() {
                    return Ok(0);
                }
                collection.add(&ids, &texts, &metadatas).await?;
                Ok::<_, StoreError>(ids.len())
            })
            .await)
    }

    async fn submit_entries(&self, entries: Vec<Entry>) -> Result<IngestionResult, IngestError> {
        self.check_options()?;
        check_ids(entries.iter().map(|e| e.id.clone()))?;

        let batches = partition(entries, self.options.batch_size);
        Ok(self
            .dispatch(batches, |collection, batch| async move {
                let mut ids = Vec::with_capacity(batch.len());
                let mut texts = Vec::with_capacity(batch.len());
                let mut metadatas = Vec::with_capacity(batch.len());
                for entry in batch {
                    ids.push(entry.id);
                    texts.push(entry.text);
                    metadatas.push(entry.metadata);
                }
                collection.add(&ids, &texts, &metadatas).await?;
                Ok::<_, StoreError>(ids.len())
            })
            .await)
    }

    fn check_options(&self) -> Result<(), IngestError> {
        if self.options.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be > 0".into()));
        }
        if self.options.max_concurrency == 0 {
            return Err(IngestError::Config("max_concurrency must be > 0".into()));
        }
        Ok(())
    }

    async fn dispatch<T, F, Fut>(&self, batches: Vec<Vec<T>>, run: F) -> IngestionResult
    where
        F: Fn(Arc<dyn Collection>, Vec<T>) -> Fut,
        Fut: Future<Output = Result<usize, StoreError>> + Send + 'static,
    {
        let mut tally = Tally {
            result: IngestionResult::default(),
            completed: 0,
            total: batches.len() as u64,
            unavailable: false,
        };
        if batches.is_empty() {
            return tally.result;
        }

        info!(
            batches = batches.len(),
            max_concurrency = self.options.max_concurrency,
            collection = self.collection.name(),
            "submitting batches"
        );

        let mut tasks = JoinSet::new();
        for (index, batch) in batches.into_iter().enumerate() {
            while tasks.len() >= self.options.max_concurrency {
                if let Some(joined) = tasks.join_next().await {
                    tally.record(joined, self.progress.as_ref());
                }
            }
            if self.cancel.is_cancelled() {
                info!(dispatched = index, "cancelled, not dispatching remaining batches");
                tally.result.stopped_early = true;
                break;
            }
            if tally.unavailable {
                warn!(dispatched = index, "store unavailable, not dispatching remaining batches");
                tally.result.stopped_early = true;
                break;
            }

            debug!(batch = index, size = batch.len(), "dispatching batch");
            let fut = run(Arc::clone(&self.collection), batch);
            tasks.spawn(async move { (index, fut.await) });
            tally.result.batches_dispatched += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            tally.record(joined, self.progress.as_ref());
        }
        tally.result
    }
}

struct Tally {
    result: IngestionResult,
    completed: u64,
    total: u64,
    unavailable: bool,
}

impl Tally {
    fn record(
        &mut self,
        joined: Result<(usize, Result<usize, StoreError>), JoinError>,
        progress: &dyn IndexProgressReporter,
    ) {
        match joined {
            Ok((index, Ok(count))) => {
                debug!(batch = index, count, "batch added");
                self.result.ingested += count;
            }
            Ok((index, Err(source))) => {
                warn!(batch = index, error = %source, "batch failed");
                self.result.batches_failed += 1;
                self.unavailable |= source.is_unavailable();
                if self.result.error.is_none() {
                    self.result.error = Some(IngestError::Batch { index, source });
                }
            }
            Err(e) => {
                warn!(error = %e, "batch worker aborted");
                self.result.batches_failed += 1;
                if self.result.error.is_none() {
                    self.result.error = Some(IngestError::Worker(e.to_string()));
                }
            }
        }
        self.completed += 1;
        progress.report(IndexProgressEvent::Submitting {
            n: self.completed,
            total: self.total,
        });
    }
}

/// Split `items` into consecutive chunks of at most `size`, preserving order.
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

fn check_ids(ids: impl Iterator<Item = String>) -> Result<(), IngestError> {
    let mut seen = HashSet::new();
    for (position, id) in ids.enumerate() {
        if id.is_empty() {
            return Err(IngestError::Config(format!(
                "item {} has an empty identifier",
                position
            )));
        }
        if !seen.insert(id) {
            return Err(IngestError::Config(format!(
                "duplicate identifier at item {}",
                position
            )));
        }
    }
    Ok(())
}
