use anyhow::{Context, Result};

use crate::config::Config;
use crate::store::StoreClient;

/// Delete the configured collection. A missing collection is an error.
pub async fn run_delete(client: &dyn StoreClient, config: &Config) -> Result<()> {
    let name = &config.store.collection;
    client
        .delete_collection(name)
        .await
        .with_context(|| format!("Failed to delete collection '{}'", name))?;
    println!("Collection '{}' deleted successfully", name);
    Ok(())
}
