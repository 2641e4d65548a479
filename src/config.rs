//! Service configuration.
//!
//! Every section has defaults, so an empty TOML file is a valid configuration.
//!
//! ```toml
//! [catalog]
//! path = "data/catalog.json"
//! image_root = "data"
//!
//! [text]
//! backends = ["remote_embedding", "local_dense", "lexical"]
//!
//! [text.remote]
//! base_url = "https://api.openai.com/v1"
//! model = "text-embedding-3-small"
//!
//! [scoring]
//! tag_weight = 0.12
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::backend::BackendKind;
use crate::error::{Result, VitrineError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VitrineConfig {
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    pub text: TextBackendsConfig,
    pub vision: VisionBackendsConfig,
    pub retry: RetryConfig,
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
    pub build: BuildConfig,
}

impl VitrineConfig {
    /// Read and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: VitrineConfig =
            toml::from_str(content).map_err(|e| VitrineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.search.validate()?;
        if self.text.backends.is_empty() {
            return Err(VitrineError::config("text.backends must not be empty"));
        }
        if self.text.backends.iter().any(|k| k.is_visual()) {
            return Err(VitrineError::config(
                "text.backends may only list text backends",
            ));
        }
        if self.vision.backends.iter().any(|k| !k.is_visual()) {
            return Err(VitrineError::config(
                "vision.backends may only list image backends",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON or CSV item list.
    pub path: PathBuf,
    /// Directory that item image references are relative to.
    pub image_root: PathBuf,
    /// Optional `{"file.jpg": {"color": .., "category": ..}}` overrides.
    pub overrides_path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/catalog.json"),
            image_root: PathBuf::from("data"),
            overrides_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache"),
        }
    }
}

/// Connection settings for an HTTP embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    /// Unset means the backend is not available for this deployment.
    pub base_url: Option<String>,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub batch_size: usize,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBackendsConfig {
    /// Priority order tried by the backend selector.
    pub backends: Vec<BackendKind>,
    pub remote: RemoteServiceConfig,
    pub local_dense: LocalDenseConfig,
    pub lexical: LexicalConfig,
}

impl Default for TextBackendsConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendKind::RemoteEmbedding,
                BackendKind::LocalDense,
                BackendKind::Lexical,
            ],
            remote: RemoteServiceConfig::default(),
            local_dense: LocalDenseConfig::default(),
            lexical: LexicalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDenseConfig {
    pub dimension: usize,
}

impl Default for LocalDenseConfig {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// Terms present in more than this fraction of items are dropped.
    pub max_df: f32,
    /// Longest word n-gram (1 or 2).
    pub max_ngram: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            max_df: 0.95,
            max_ngram: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionBackendsConfig {
    pub backends: Vec<BackendKind>,
    pub remote: RemoteServiceConfig,
    /// Timeout for query-time URL fetches.
    pub fetch_timeout_ms: u64,
}

impl Default for VisionBackendsConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::VisualEmbedding, BackendKind::PerceptualColor],
            remote: RemoteServiceConfig {
                model: "clip-vit-base-patch32".to_string(),
                batch_size: 1,
                ..RemoteServiceConfig::default()
            },
            fetch_timeout_ms: 8_000,
        }
    }
}

impl VisionBackendsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Timeout and retry policy for remote calls made during a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Upper bound of random jitter added to each backoff.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            max_retries: 2,
            backoff_ms: 500,
            jitter_ms: 100,
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Score fusion constants.
///
/// These were tuned by hand against one catalog and are not normalized across
/// backends; scores are only comparable within one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Boost per query token found in the item tags.
    pub tag_weight: f32,
    /// Maximum number of rewarded tag matches.
    pub tag_cap: usize,
    /// Weight of `price / max_price` when a price ceiling is given.
    pub price_weight: f32,
    /// Exact color match for vision queries.
    pub color_match: f32,
    /// Weak prior for neutral-colored items in vision queries.
    pub neutral_prior: f32,
    /// Weight of the neighbour category share.
    pub category_prior_weight: f32,
    /// Number of nearest neighbours inspected for the category prior.
    pub category_prior_neighbours: usize,
    /// Extra boost for the most frequent neighbour category.
    pub category_leader_bonus: f32,
    /// Weight of histogram intersection blended into deep visual base scores.
    pub histogram_blend: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tag_weight: 0.12,
            tag_cap: 2,
            price_weight: 0.10,
            color_match: 0.12,
            neutral_prior: 0.02,
            category_prior_weight: 0.15,
            category_prior_neighbours: 40,
            category_leader_bonus: 0.05,
            histogram_blend: 0.25,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("tag_weight", self.tag_weight),
            ("price_weight", self.price_weight),
            ("color_match", self.color_match),
            ("neutral_prior", self.neutral_prior),
            ("category_prior_weight", self.category_prior_weight),
            ("category_leader_bonus", self.category_leader_bonus),
            ("histogram_blend", self.histogram_blend),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(VitrineError::config(format!(
                    "scoring.{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.category_prior_neighbours == 0 {
            return Err(VitrineError::config(
                "scoring.category_prior_neighbours must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub text_top_k: usize,
    pub vision_top_k: usize,
    pub max_top_k: usize,
    /// Used when a text query arrives blank.
    pub default_query: String,
    /// Bound on a query-time call to a remote backend. Queries get one attempt.
    pub query_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            text_top_k: 12,
            vision_top_k: 8,
            max_top_k: 100,
            default_query: "popular picks".to_string(),
            query_timeout_ms: 3_000,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_top_k == 0 {
            return Err(VitrineError::config("search.max_top_k must be at least 1"));
        }
        if self.query_timeout_ms == 0 {
            return Err(VitrineError::config(
                "search.query_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Clamp a requested result count into `[1, max_top_k]`.
    pub fn clamp_top_k(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).clamp(1, self.max_top_k)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Worker threads for per-item encoding; 0 means one per CPU.
    pub threads: usize,
    /// Maximum in-flight requests to a remote backend.
    pub remote_concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            remote_concurrency: 4,
        }
    }
}

impl BuildConfig {
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = VitrineConfig::from_toml("").unwrap();
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.text.backends.len(), 3);
        assert_eq!(config.search.default_query, "popular picks");
    }

    #[test]
    fn test_partial_sections() {
        let config = VitrineConfig::from_toml(
            r#"
            [text]
            backends = ["lexical"]

            [scoring]
            tag_weight = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.text.backends, vec![BackendKind::Lexical]);
        assert_eq!(config.scoring.tag_weight, 0.2);
        assert_eq!(config.scoring.price_weight, 0.10);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let err = VitrineConfig::from_toml("[scoring]\ncolor_match = -1.0\n").unwrap_err();
        assert!(matches!(err, VitrineError::Config(_)));
    }

    #[test]
    fn test_rejects_misplaced_backend() {
        assert!(VitrineConfig::from_toml("[text]\nbackends = [\"perceptual_color\"]\n").is_err());
        assert!(VitrineConfig::from_toml("[vision]\nbackends = [\"lexical\"]\n").is_err());
    }

    #[test]
    fn test_clamp_top_k() {
        let search = SearchConfig::default();
        assert_eq!(search.clamp_top_k(None, 12), 12);
        assert_eq!(search.clamp_top_k(Some(0), 12), 1);
        assert_eq!(search.clamp_top_k(Some(1_000), 12), 100);
    }

    #[test]
    fn test_query_timeout_is_independent_of_retry_timeout() {
        let config = VitrineConfig::from_toml("[search]\nquery_timeout_ms = 1500\n").unwrap();
        assert_eq!(config.search.query_timeout(), Duration::from_millis(1500));
        assert!(config.search.query_timeout() < config.retry.timeout());

        assert!(VitrineConfig::from_toml("[search]\nquery_timeout_ms = 0\n").is_err());
    }
}
