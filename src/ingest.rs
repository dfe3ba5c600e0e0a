//! Index orchestration.
//!
//! Walks the target, opens (or creates) the collection, and hands the
//! documents to the batch [`Ingestor`]. The walk happens before any store
//! call, so a bad root or filter fails without touching the server.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batch::{IngestionResult, Ingestor};
use crate::config::Config;
use crate::connector_fs::{collect_documents, Extractor};
use crate::error::IngestError;
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::store::StoreClient;

pub async fn run_index(
    client: &dyn StoreClient,
    config: &Config,
    target: &Path,
    progress: Arc<dyn IndexProgressReporter>,
    cancel: CancellationToken,
) -> Result<IngestionResult> {
    progress.report(IndexProgressEvent::Discovering {
        root: target.display().to_string(),
    });

    let options = config.index.filter_options(target);
    let extractor = Extractor::new(target, &options)?.follow_links(config.index.follow_symlinks);
    let documents = collect_documents(&extractor)
        .with_context(|| format!("Failed to scan {}", target.display()))?;

    if documents.is_empty() {
        println!("No files found to index");
        return Ok(IngestionResult::default());
    }

    for doc in &documents {
        println!("Indexing: {}", doc.metadata.path);
    }
    let expected = documents.len();
    info!(files = expected, root = %extractor.root().display(), "walk complete");

    let collection = client
        .get_or_create_collection(&config.store.collection)
        .await
        .with_context(|| {
            format!(
                "Failed to get or create collection '{}'",
                config.store.collection
            )
        })?;

    let result = Ingestor::new(collection, config.index.batch_options())
        .with_cancellation(cancel.clone())
        .with_progress(progress)
        .submit(documents)
        .await?;

    if result.stopped_early && cancel.is_cancelled() {
        bail!(
            "Indexing interrupted after {} of {} files",
            result.ingested,
            expected
        );
    }
    let unavailable = matches!(
        &result.error,
        Some(IngestError::Batch { source, .. }) if source.is_unavailable()
    );
    if unavailable || result.stopped_early {
        let cause = result
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "dispatch stopped early".to_string());
        bail!(
            "Store unavailable after indexing {} of {} files: {}",
            result.ingested,
            expected,
            cause
        );
    }
    if let Some(err) = &result.error {
        if result.ingested == 0 {
            bail!("Failed to index any of {} files: {}", expected, err);
        }
        warn!(
            failed_batches = result.batches_failed,
            ingested = result.ingested,
            error = %err,
            "some batches failed"
        );
    }

    println!("Successfully indexed {} files", result.ingested);
    Ok(result)
}
