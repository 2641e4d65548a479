//! Error types for Vitrine.
//!
//! Only index builds fail hard. Backend failures during a build are absorbed by
//! the backend selector (they demote to the next backend), and query-time
//! failures are turned into degraded, empty responses by the service.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VitrineError>;

/// One failed attempt recorded while building an index generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAttempt {
    pub backend: String,
    pub reason: String,
}

impl std::fmt::Display for BackendAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum VitrineError {
    /// A similarity backend failed (timeout, transport error, malformed response).
    #[error("backend '{backend}' unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// Every backend in the priority list failed for one modality.
    #[error("index build failed for {modality}: {}", format_attempts(.attempts))]
    BuildFailure {
        modality: String,
        attempts: Vec<BackendAttempt>,
    },

    /// A query-time image could not be fetched or decoded.
    #[error("image fetch failed: {0}")]
    FetchFailure(String),

    /// The catalog violates a structural invariant.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

fn format_attempts(attempts: &[BackendAttempt]) -> String {
    if attempts.is_empty() {
        return "no backend configured".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl VitrineError {
    pub fn backend_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        VitrineError::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn build_failure(modality: impl Into<String>, attempts: Vec<BackendAttempt>) -> Self {
        VitrineError::BuildFailure {
            modality: modality.into(),
            attempts,
        }
    }

    pub fn fetch_failure(message: impl Into<String>) -> Self {
        VitrineError::FetchFailure(message.into())
    }

    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        VitrineError::InvalidCatalog(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        VitrineError::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        VitrineError::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        VitrineError::Internal(message.into())
    }

    /// Whether this error is a transient backend failure.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, VitrineError::BackendUnavailable { .. })
    }
}
