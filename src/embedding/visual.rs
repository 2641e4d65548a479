//! Remote deep visual embedding backend.
//!
//! Posts raw image bytes to `{base}/embed/image` and expects
//! `{"embedding": [..]}`. Catalog and query images go through the same model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use log::debug;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::config::RemoteServiceConfig;
use crate::embedding::backend::{BackendIdentity, BackendKind, ImageEncoder, check_corpus};
use crate::embedding::retry::RetryPolicy;
use crate::error::{Result, VitrineError};
use crate::vector::Vector;
use crate::vision::image::PreparedImage;

#[derive(Debug, Deserialize)]
struct ImageEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct RemoteVisualBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    concurrency: usize,
    build_policy: RetryPolicy,
    query_policy: RetryPolicy,
}

impl RemoteVisualBackend {
    pub fn new(
        base_url: &str,
        config: &RemoteServiceConfig,
        policy: RetryPolicy,
        query_timeout: Duration,
        concurrency: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout())
            .build()
            .map_err(|e| VitrineError::internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            concurrency: concurrency.max(1),
            query_policy: RetryPolicy::single_attempt(query_timeout),
            build_policy: policy,
        })
    }

    async fn request_embedding(&self, image: &PreparedImage) -> Result<Vector> {
        let url = format!("{}/embed/image", self.base_url);
        let backend = self.identity().to_string();

        let mut builder = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.bytes().to_vec());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| VitrineError::backend_unavailable(&backend, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VitrineError::backend_unavailable(
                backend,
                format!("HTTP {status}: {body}"),
            ));
        }

        let parsed: ImageEmbeddingResponse = response.json().await.map_err(|e| {
            VitrineError::backend_unavailable(&backend, format!("malformed response: {e}"))
        })?;
        if parsed.embedding.is_empty() {
            return Err(VitrineError::backend_unavailable(backend, "empty embedding"));
        }
        Ok(Vector::new(parsed.embedding).normalized())
    }
}

#[async_trait]
impl ImageEncoder for RemoteVisualBackend {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::VisualEmbedding, self.model.clone())
    }

    async fn encode_corpus(&self, images: Arc<[PreparedImage]>) -> Result<Vec<Vector>> {
        let identity = self.identity().to_string();
        debug!("{identity}: encoding {} images", images.len());

        let vectors: Vec<Vector> = stream::iter(images.iter().cloned())
            .map(|image| {
                let identity = identity.clone();
                async move {
                    self.build_policy
                        .run(&identity, || self.request_embedding(&image))
                        .await
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        check_corpus(&self.identity(), &vectors, images.len())?;
        Ok(vectors)
    }

    async fn encode_query(&self, image: &PreparedImage) -> Result<Vector> {
        self.query_policy
            .run(&self.identity().to_string(), || self.request_embedding(image))
            .await
    }
}
