//! Remote text embedding backend (OpenAI-compatible `/embeddings` endpoint).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::RemoteServiceConfig;
use crate::embedding::backend::{
    BackendIdentity, BackendKind, EncoderState, TextCorpusEncoding, TextEncoder, check_corpus,
};
use crate::embedding::retry::RetryPolicy;
use crate::error::{Result, VitrineError};
use crate::vector::Vector;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct RemoteEmbeddingBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    concurrency: usize,
    build_policy: RetryPolicy,
    query_policy: RetryPolicy,
}

/// Order embeddings by their `index` field.
///
/// The indices must be exactly `0..expected`, otherwise the response is
/// rejected as malformed.
fn into_ordered_vectors(
    backend: &str,
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vector>> {
    if data.len() != expected {
        return Err(VitrineError::backend_unavailable(
            backend,
            format!(
                "malformed response: {} embeddings for {expected} inputs",
                data.len()
            ),
        ));
    }
    data.sort_by_key(|d| d.index);
    if let Some((position, d)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
        return Err(VitrineError::backend_unavailable(
            backend,
            format!(
                "malformed response: embedding index {} at position {position}",
                d.index
            ),
        ));
    }
    Ok(data
        .into_iter()
        .map(|d| Vector::new(d.embedding).normalized())
        .collect())
}

impl RemoteEmbeddingBackend {
    /// `policy` bounds corpus requests; query requests get a single attempt
    /// limited to `query_timeout`.
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
        let api_key = std::env::var(&config.api_key_env).ok();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            batch_size: config.batch_size.max(1),
            concurrency: concurrency.max(1),
            query_policy: RetryPolicy::single_attempt(query_timeout),
            build_policy: policy,
        })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| {
            VitrineError::backend_unavailable(self.identity().to_string(), e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VitrineError::backend_unavailable(
                self.identity().to_string(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let backend = self.identity().to_string();
        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            VitrineError::backend_unavailable(&backend, format!("malformed response: {e}"))
        })?;
        into_ordered_vectors(&backend, parsed.data, texts.len())
    }
}

#[async_trait]
impl TextEncoder for RemoteEmbeddingBackend {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::RemoteEmbedding, self.model.clone())
    }

    async fn encode_corpus(&self, texts: Arc<[String]>) -> Result<TextCorpusEncoding> {
        let identity = self.identity().to_string();
        let batches: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        debug!(
            "{identity}: encoding {} texts in {} batches",
            texts.len(),
            batches.len()
        );

        let encoded: Vec<Vec<Vector>> = stream::iter(batches)
            .map(|batch| {
                let identity = identity.clone();
                async move {
                    self.build_policy
                        .run(&identity, || self.request_embeddings(&batch))
                        .await
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vector> = encoded.into_iter().flatten().collect();
        check_corpus(&self.identity(), &vectors, texts.len())?;
        Ok(TextCorpusEncoding {
            vectors,
            state: EncoderState::Stateless,
        })
    }

    async fn encode_query(&self, text: &str, _state: &EncoderState) -> Result<Vector> {
        let input = [text.to_string()];
        let mut vectors = self
            .query_policy
            .run(&self.identity().to_string(), || {
                self.request_embeddings(&input)
            })
            .await?;
        vectors.pop().ok_or_else(|| {
            VitrineError::backend_unavailable(self.identity().to_string(), "empty response")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One unit axis per index, so order survives normalization.
    fn data(indices: &[usize]) -> Vec<EmbeddingData> {
        indices
            .iter()
            .map(|&index| {
                let mut embedding = vec![0.0; 4];
                embedding[index.min(3)] = 2.0;
                EmbeddingData { embedding, index }
            })
            .collect()
    }

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let vectors = into_ordered_vectors("remote", data(&[2, 0, 1]), 3).unwrap();
        for (i, vector) in vectors.iter().enumerate() {
            let mut axis = vec![0.0; 4];
            axis[i] = 1.0;
            assert_eq!(*vector, Vector::new(axis));
        }
    }

    #[test]
    fn test_duplicate_or_out_of_range_indices_are_rejected() {
        let err = into_ordered_vectors("remote", data(&[0, 0]), 2).unwrap_err();
        assert!(err.is_backend_unavailable());

        let err = into_ordered_vectors("remote", data(&[0, 5]), 2).unwrap_err();
        assert!(err.is_backend_unavailable());

        let err = into_ordered_vectors("remote", data(&[0]), 2).unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_query_timeout_is_separate_from_build_timeout() {
        let backend = RemoteEmbeddingBackend::new(
            "http://127.0.0.1:9/v1",
            &RemoteServiceConfig::default(),
            RetryPolicy::single_attempt(Duration::from_secs(20)),
            Duration::from_millis(1500),
            2,
        )
        .unwrap();
        assert_eq!(backend.build_policy.timeout(), Duration::from_secs(20));
        assert_eq!(backend.query_policy.timeout(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_backend_unavailable() {
        let policy = RetryPolicy::single_attempt(Duration::from_millis(500));
        let backend = RemoteEmbeddingBackend::new(
            "http://127.0.0.1:9/v1/",
            &RemoteServiceConfig::default(),
            policy,
            Duration::from_millis(500),
            2,
        )
        .unwrap();
        assert_eq!(backend.base_url, "http://127.0.0.1:9/v1");

        let texts: Arc<[String]> = vec!["red bag".to_string()].into();
        let err = backend.encode_corpus(texts).await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }
}
