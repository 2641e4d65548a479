//! Backend identity and the encoder traits every similarity backend implements.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::lexical::TfIdfModel;
use crate::error::{Result, VitrineError};
use crate::vector::{Similarity, Vector};
use crate::vision::image::PreparedImage;

/// The family a similarity backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Remote semantic text embedding service.
    RemoteEmbedding,
    /// In-process hashed dense text encoder.
    LocalDense,
    /// TF-IDF statistical text encoder.
    Lexical,
    /// Deep visual embedding shared by catalog images and query images.
    VisualEmbedding,
    /// Quantized HSV histogram.
    PerceptualColor,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::RemoteEmbedding => "remote_embedding",
            BackendKind::LocalDense => "local_dense",
            BackendKind::Lexical => "lexical",
            BackendKind::VisualEmbedding => "visual_embedding",
            BackendKind::PerceptualColor => "perceptual_color",
        }
    }

    /// Whether the backend encodes images rather than text.
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            BackendKind::VisualEmbedding | BackendKind::PerceptualColor
        )
    }

    /// Native similarity measure of vectors produced by this backend.
    pub fn similarity(&self) -> Similarity {
        match self {
            BackendKind::PerceptualColor => Similarity::HistogramIntersection,
            _ => Similarity::Cosine,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity stored with a generation. Queries are only ever encoded by the
/// backend whose identity matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendIdentity {
    pub kind: BackendKind,
    pub model: String,
}

impl BackendIdentity {
    pub fn new(kind: BackendKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
        }
    }

    pub fn similarity(&self) -> Similarity {
        self.kind.similarity()
    }
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.model)
    }
}

/// Fitted encoder state that travels with a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncoderState {
    Stateless,
    Lexical(TfIdfModel),
}

/// Output of encoding the whole catalog with one text backend.
#[derive(Debug, Clone)]
pub struct TextCorpusEncoding {
    pub vectors: Vec<Vector>,
    pub state: EncoderState,
}

#[async_trait]
pub trait TextEncoder: Send + Sync + fmt::Debug {
    fn identity(&self) -> BackendIdentity;

    /// Encode every item text. Any error abandons the backend for the build.
    async fn encode_corpus(&self, texts: Arc<[String]>) -> Result<TextCorpusEncoding>;

    /// Encode a query with the state produced by `encode_corpus`.
    async fn encode_query(&self, text: &str, state: &EncoderState) -> Result<Vector>;
}

#[async_trait]
pub trait ImageEncoder: Send + Sync + fmt::Debug {
    fn identity(&self) -> BackendIdentity;

    async fn encode_corpus(&self, images: Arc<[PreparedImage]>) -> Result<Vec<Vector>>;

    async fn encode_query(&self, image: &PreparedImage) -> Result<Vector>;
}

/// Rayon pool used for CPU-bound per-item encoding.
///
/// Work is moved off the async runtime with `spawn_blocking` and fanned out
/// inside the pool.
#[derive(Clone, Debug)]
pub struct EncodePool {
    pool: Arc<rayon::ThreadPool>,
}

impl EncodePool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("vitrine-encode-{i}"))
            .build()
            .map_err(|err| VitrineError::internal(format!("failed to build encode pool: {err}")))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Run `work` inside the pool and wait for it without blocking the runtime.
    pub async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.install(work))
            .await
            .map_err(|err| VitrineError::internal(format!("encode task failed: {err}")))
    }
}

/// Reject corpora whose vectors disagree in dimension or contain non-finite values.
pub fn check_corpus(backend: &BackendIdentity, vectors: &[Vector], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(VitrineError::backend_unavailable(
            backend.to_string(),
            format!("expected {expected} vectors, got {}", vectors.len()),
        ));
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let dimension = first.dimension();
    if dimension == 0 {
        return Err(VitrineError::backend_unavailable(
            backend.to_string(),
            "zero-dimensional vectors",
        ));
    }
    for (position, vector) in vectors.iter().enumerate() {
        if vector.dimension() != dimension {
            return Err(VitrineError::backend_unavailable(
                backend.to_string(),
                format!(
                    "vector {position} has dimension {}, expected {dimension}",
                    vector.dimension()
                ),
            ));
        }
        if !vector.is_valid() {
            return Err(VitrineError::backend_unavailable(
                backend.to_string(),
                format!("vector {position} contains non-finite values"),
            ));
        }
    }
    Ok(())
}
