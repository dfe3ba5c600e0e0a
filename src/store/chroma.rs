//! Chroma HTTP API v2 backend.
//!
//! Talks to `{url}/api/v2/tenants/{tenant}/databases/{database}/collections`.
//! Vectors are computed client-side by an [`Embedder`] before each `add` and
//! `query`, the same way Chroma's own clients apply an embedding function.
//! New collections record the embedder's model under `embedding_model`.
//!
//! Error mapping:
//! - connection refused / timeout → [`StoreError::Unavailable`]
//! - HTTP 404, or a 400 saying the collection does not exist → [`StoreError::NotFound`]
//! - any other non-2xx → [`StoreError::Api`]

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::error::StoreError;
use crate::models::Metadata;

use super::{Collection, QueryResponse, StoreClient};

#[derive(Debug, Deserialize)]
struct CollectionModel {
    id: String,
    name: String,
}

struct Inner {
    http: reqwest::Client,
    url: String,
    collections_url: String,
    embedder: Arc<dyn Embedder>,
}

impl Inner {
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        collection: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreError::Unavailable {
                    url: self.url.clone(),
                    message: e.to_string(),
                }
            } else {
                StoreError::InvalidResponse(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::BAD_REQUEST && body.contains("does not exist"))
        {
            return Err(StoreError::NotFound(collection.to_string()));
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

/// Client for one Chroma server, tenant and database.
#[derive(Clone)]
pub struct ChromaClient {
    inner: Arc<Inner>,
}

impl ChromaClient {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self> {
        let store = &config.store;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(store.timeout_secs))
            .build()?;
        let url = store.url.trim_end_matches('/').to_string();
        let collections_url = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            url, store.tenant, store.database
        );

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                url,
                collections_url,
                embedder,
            }),
        })
    }

    /// Client using the configured Ollama embedder.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = OllamaEmbedder::new(&config.embedding)?;
        Self::new(config, Arc::new(embedder))
    }

    fn handle(&self, model: CollectionModel) -> Arc<dyn Collection> {
        debug!(id = %model.id, name = %model.name, "opened collection");
        Arc::new(ChromaCollection {
            id: model.id,
            name: model.name,
            inner: Arc::clone(&self.inner),
        })
    }
}

#[async_trait]
impl StoreClient for ChromaClient {
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Collection>, StoreError> {
        let body = serde_json::json!({
            "name": name,
            "get_or_create": true,
            "metadata": { "embedding_model": self.inner.embedder.model_name() },
        });
        let request = self.inner.http.post(&self.inner.collections_url).json(&body);
        let response = self.inner.send(request, name).await?;
        let model: CollectionModel = Inner::read_json(response).await?;
        Ok(self.handle(model))
    }

    async fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError> {
        let request = self
            .inner
            .http
            .get(format!("{}/{}", self.inner.collections_url, name));
        let response = self.inner.send(request, name).await?;
        let model: CollectionModel = Inner::read_json(response).await?;
        Ok(self.handle(model))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let request = self
            .inner
            .http
            .delete(format!("{}/{}", self.inner.collections_url, name));
        self.inner.send(request, name).await?;
        Ok(())
    }
}

/// Handle to one Chroma collection, addressed by its id.
pub struct ChromaCollection {
    id: String,
    name: String,
    inner: Arc<Inner>,
}

#[async_trait]
impl Collection for ChromaCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[Metadata],
    ) -> Result<(), StoreError> {
        let embeddings = self.inner.embedder.embed(texts).await?;
        let body = serde_json::json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": texts,
            "metadatas": metadatas,
        });
        let request = self
            .inner
            .http
            .post(format!("{}/{}/add", self.inner.collections_url, self.id))
            .json(&body);
        self.inner.send(request, &self.name).await?;
        Ok(())
    }

    async fn query(&self, text: &str, n: usize) -> Result<QueryResponse, StoreError> {
        let embeddings = self.inner.embedder.embed(&[text.to_string()]).await?;
        let body = serde_json::json!({
            "query_embeddings": embeddings,
            "n_results": n,
            "include": ["documents", "metadatas", "distances"],
        });
        let request = self
            .inner
            .http
            .post(format!("{}/{}/query", self.inner.collections_url, self.id))
            .json(&body);
        let response = self.inner.send(request, &self.name).await?;
        Inner::read_json(response).await
    }
}
