//! Backend selection with per-build demotion.
//!
//! Each modality walks its backends in priority order. The first backend that
//! encodes the whole corpus wins and its identity is stored with the
//! generation. A failing backend is abandoned for the rest of the build and
//! none of its partial output is kept.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::config::VitrineConfig;
use crate::embedding::backend::{
    BackendIdentity, BackendKind, EncodePool, ImageEncoder, TextEncoder, check_corpus,
};
use crate::embedding::{
    LexicalEncoder, LocalDenseEncoder, PerceptualColorEncoder, RemoteEmbeddingBackend,
    RemoteVisualBackend, RetryPolicy,
};
use crate::error::{BackendAttempt, Result, VitrineError};
use crate::index::generation::{IndexGeneration, TextSection, VisionEntry, VisionSection};
use crate::vision::image::{PreparedImage, file_name};
use crate::vision::{
    DirectoryImageSource, ImageFeatures, ImageOverrides, ImageSource, resolve_category,
    resolve_color,
};

#[derive(Debug, Clone)]
pub struct BackendSelector {
    text: Vec<Arc<dyn TextEncoder>>,
    image: Vec<Arc<dyn ImageEncoder>>,
    image_source: Option<Arc<dyn ImageSource>>,
    overrides: Arc<ImageOverrides>,
    pool: EncodePool,
}

impl BackendSelector {
    pub fn builder(pool: EncodePool) -> BackendSelectorBuilder {
        BackendSelectorBuilder {
            text: Vec::new(),
            image: Vec::new(),
            image_source: None,
            overrides: ImageOverrides::default(),
            pool,
        }
    }

    /// Register the backends listed in the configuration, in their listed order.
    ///
    /// Remote backends without a `base_url` are skipped.
    pub fn from_config(config: &VitrineConfig) -> Result<Self> {
        let pool = EncodePool::new(config.build.worker_threads())?;
        let policy = RetryPolicy::from_config(&config.retry);
        let concurrency = config.build.remote_concurrency;
        let mut builder = Self::builder(pool.clone());

        for kind in &config.text.backends {
            match kind {
                BackendKind::RemoteEmbedding => match &config.text.remote.base_url {
                    Some(url) => {
                        builder = builder.text_backend(Arc::new(RemoteEmbeddingBackend::new(
                            url,
                            &config.text.remote,
                            policy.clone(),
                            config.search.query_timeout(),
                            concurrency,
                        )?));
                    }
                    None => info!("text.remote.base_url is not set, skipping {kind}"),
                },
                BackendKind::LocalDense => {
                    builder = builder.text_backend(Arc::new(LocalDenseEncoder::new(
                        config.text.local_dense.dimension,
                        pool.clone(),
                    )?));
                }
                BackendKind::Lexical => {
                    builder = builder.text_backend(Arc::new(LexicalEncoder::new(
                        &config.text.lexical,
                        pool.clone(),
                    )?));
                }
                other => {
                    return Err(VitrineError::config(format!(
                        "{other} is not a text backend"
                    )));
                }
            }
        }

        for kind in &config.vision.backends {
            match kind {
                BackendKind::VisualEmbedding => match &config.vision.remote.base_url {
                    Some(url) => {
                        builder = builder.image_backend(Arc::new(RemoteVisualBackend::new(
                            url,
                            &config.vision.remote,
                            policy.clone(),
                            config.search.query_timeout(),
                            concurrency,
                        )?));
                    }
                    None => info!("vision.remote.base_url is not set, skipping {kind}"),
                },
                BackendKind::PerceptualColor => {
                    builder =
                        builder.image_backend(Arc::new(PerceptualColorEncoder::new(pool.clone())));
                }
                other => {
                    return Err(VitrineError::config(format!(
                        "{other} is not an image backend"
                    )));
                }
            }
        }

        let overrides = ImageOverrides::load_or_default(config.catalog.overrides_path.as_deref());
        Ok(builder
            .image_source(Arc::new(DirectoryImageSource::new(
                config.catalog.image_root.clone(),
            )))
            .overrides(overrides)
            .build())
    }

    /// Registered text backends in priority order.
    pub fn text_identities(&self) -> Vec<BackendIdentity> {
        self.text.iter().map(|e| e.identity()).collect()
    }

    pub fn image_identities(&self) -> Vec<BackendIdentity> {
        self.image.iter().map(|e| e.identity()).collect()
    }

    /// The text encoder that produced vectors with `identity`, if still registered.
    pub fn text_encoder_for(&self, identity: &BackendIdentity) -> Option<Arc<dyn TextEncoder>> {
        self.text.iter().find(|e| &e.identity() == identity).cloned()
    }

    pub fn image_encoder_for(&self, identity: &BackendIdentity) -> Option<Arc<dyn ImageEncoder>> {
        self.image.iter().find(|e| &e.identity() == identity).cloned()
    }

    /// Whether a generation built with these identities can still be queried.
    pub fn can_serve(&self, generation: &IndexGeneration) -> bool {
        let text_ok = self.text_encoder_for(&generation.text().identity).is_some();
        let vision_ok = match generation.vision() {
            Some(vision) => self.image_encoder_for(&vision.identity).is_some(),
            None => self.image.is_empty(),
        };
        text_ok && vision_ok
    }

    /// Build a new generation from `catalog`.
    ///
    /// Fails with `BuildFailure` only when every backend of one modality failed.
    pub async fn build(&self, catalog: Arc<CatalogStore>) -> Result<IndexGeneration> {
        let started = Instant::now();
        info!("building index generation for {} items", catalog.len());

        let text = self.build_text(&catalog).await?;
        let vision = if self.image.is_empty() {
            None
        } else {
            Some(self.build_vision(&catalog).await?)
        };

        let generation = IndexGeneration::new(catalog, text, vision)?;
        info!(
            "built generation {} in {:.2?} (text: {}, vision: {})",
            generation.id(),
            started.elapsed(),
            generation.text().identity,
            generation
                .vision()
                .map_or_else(|| "none".to_string(), |v| v.identity.to_string())
        );
        Ok(generation)
    }

    async fn build_text(&self, catalog: &CatalogStore) -> Result<TextSection> {
        let texts: Arc<[String]> = catalog.items().iter().map(|i| i.text_blob()).collect();
        let mut attempts = Vec::new();

        for encoder in &self.text {
            let identity = encoder.identity();
            let started = Instant::now();
            let outcome = match encoder.encode_corpus(texts.clone()).await {
                Ok(encoding) => check_corpus(&identity, &encoding.vectors, texts.len())
                    .map(|_| encoding),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(encoding) => {
                    debug!("{identity} encoded {} texts in {:.2?}", texts.len(), started.elapsed());
                    return Ok(TextSection {
                        identity,
                        state: encoding.state,
                        vectors: encoding.vectors,
                    });
                }
                Err(err) => {
                    warn!("text backend {identity} failed, demoting: {err}");
                    attempts.push(BackendAttempt {
                        backend: identity.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Err(VitrineError::build_failure("text", attempts))
    }

    async fn build_vision(&self, catalog: &Arc<CatalogStore>) -> Result<VisionSection> {
        let (entries, images) = self.prepare_images(catalog).await?;
        let images: Arc<[PreparedImage]> = images.into();
        let mut attempts = Vec::new();

        for encoder in &self.image {
            let identity = encoder.identity();
            let outcome = match encoder.encode_corpus(images.clone()).await {
                Ok(vectors) => check_corpus(&identity, &vectors, images.len()).map(|_| vectors),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(vectors) => {
                    debug!("{identity} encoded {} images", images.len());
                    return Ok(VisionSection {
                        identity,
                        entries,
                        vectors,
                    });
                }
                Err(err) => {
                    warn!("image backend {identity} failed, demoting: {err}");
                    attempts.push(BackendAttempt {
                        backend: identity.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Err(VitrineError::build_failure("vision", attempts))
    }

    /// Load, decode and analyze every catalog image. Items whose image cannot
    /// be loaded are left out of the vision section.
    async fn prepare_images(
        &self,
        catalog: &Arc<CatalogStore>,
    ) -> Result<(Vec<VisionEntry>, Vec<PreparedImage>)> {
        let Some(source) = self.image_source.clone() else {
            return Ok((Vec::new(), Vec::new()));
        };
        let catalog = catalog.clone();
        let overrides = self.overrides.clone();

        let prepared = self
            .pool
            .run(move || {
                use rayon::prelude::*;

                catalog
                    .items()
                    .par_iter()
                    .enumerate()
                    .filter_map(|(position, item)| {
                        let reference = item.image.as_deref()?;
                        let name = file_name(reference);
                        let image = match source
                            .load(reference)
                            .and_then(|bytes| PreparedImage::decode(bytes, name.clone()))
                        {
                            Ok(image) => image,
                            Err(err) => {
                                warn!("skipping image of item '{}': {err}", item.id);
                                return None;
                            }
                        };

                        let features = ImageFeatures::extract(&image);
                        let manual = name.as_deref().and_then(|n| overrides.get(n));
                        let entry = VisionEntry {
                            position,
                            category: resolve_category(manual, item.category),
                            color: resolve_color(
                                manual,
                                item.color,
                                name.as_deref(),
                                features.dominant_color,
                            ),
                            dominant_color: features.dominant_color,
                            histogram: features.histogram,
                        };
                        Some((entry, image))
                    })
                    .collect::<Vec<_>>()
            })
            .await?;

        info!("prepared {} catalog images", prepared.len());
        Ok(prepared.into_iter().unzip())
    }
}

pub struct BackendSelectorBuilder {
    text: Vec<Arc<dyn TextEncoder>>,
    image: Vec<Arc<dyn ImageEncoder>>,
    image_source: Option<Arc<dyn ImageSource>>,
    overrides: ImageOverrides,
    pool: EncodePool,
}

impl BackendSelectorBuilder {
    /// Append a text backend at the lowest priority so far.
    pub fn text_backend(mut self, encoder: Arc<dyn TextEncoder>) -> Self {
        self.text.push(encoder);
        self
    }

    /// Append an image backend at the lowest priority so far.
    pub fn image_backend(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.image.push(encoder);
        self
    }

    pub fn image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.image_source = Some(source);
        self
    }

    pub fn overrides(mut self, overrides: ImageOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn build(self) -> BackendSelector {
        BackendSelector {
            text: self.text,
            image: self.image,
            image_source: self.image_source,
            overrides: Arc::new(self.overrides),
            pool: self.pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLoader;

    fn catalog() -> Arc<CatalogStore> {
        Arc::new(
            CatalogLoader::from_json_str(
                r#"[{"id": "1", "title": "Red running shoe", "category": "shoes", "price": 80},
                    {"id": "2", "title": "Canvas tote", "category": "bags", "price": 25}]"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_from_config_skips_unconfigured_remotes() {
        let selector = BackendSelector::from_config(&VitrineConfig::default()).unwrap();
        let kinds: Vec<BackendKind> = selector.text_identities().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![BackendKind::LocalDense, BackendKind::Lexical]);
        let kinds: Vec<BackendKind> = selector.image_identities().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![BackendKind::PerceptualColor]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_uses_first_backend() {
        let pool = EncodePool::new(2).unwrap();
        let selector = BackendSelector::builder(pool.clone())
            .text_backend(Arc::new(LocalDenseEncoder::new(64, pool.clone()).unwrap()))
            .build();

        let generation = selector.build(catalog()).await.unwrap();
        assert_eq!(generation.text().identity.kind, BackendKind::LocalDense);
        assert_eq!(generation.text().vectors.len(), 2);
        assert!(generation.vision().is_none());
        assert!(selector.can_serve(&generation));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_backends_is_build_failure() {
        let selector = BackendSelector::builder(EncodePool::new(1).unwrap()).build();
        let err = selector.build(catalog()).await.unwrap_err();
        assert!(matches!(err, VitrineError::BuildFailure { .. }));
    }
}
