//! The always-answering search service.
//!
//! Queries never fail: anything that goes wrong at query time becomes a
//! degraded, empty response. Only rebuilds return errors, and a failed rebuild
//! leaves the previously served generation in place.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogLoader, CatalogStore};
use crate::config::VitrineConfig;
use crate::error::Result;
use crate::index::{
    BackendSelector, GenerationInfo, GenerationStore, IndexGeneration, IndexPublisher,
};
use crate::search::{
    Scorer, SearchResponse, TextSearchEngine, TextSearchRequest, VisionSearchEngine,
    VisionSearchRequest, resolve_payload,
};

/// Result of a successful rebuild command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub generation: GenerationInfo,
    /// The persisted or already-served generation was reused instead of building.
    pub reused: bool,
    /// The generation is on disk under the cache directory.
    pub persisted: bool,
}

pub struct VitrineService {
    config: VitrineConfig,
    selector: BackendSelector,
    publisher: IndexPublisher,
    store: GenerationStore,
    scorer: Scorer,
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl VitrineService {
    /// Create a service with the backends named in `config`, without building.
    pub fn new(config: VitrineConfig) -> Result<Self> {
        config.validate()?;
        let selector = BackendSelector::from_config(&config)?;
        Ok(Self::with_selector(config, selector))
    }

    /// Create a service with an explicit backend selector.
    pub fn with_selector(config: VitrineConfig, selector: BackendSelector) -> Self {
        Self {
            store: GenerationStore::new(&config.cache.dir),
            scorer: Scorer::new(config.scoring.clone()),
            publisher: IndexPublisher::new(),
            rebuild_lock: tokio::sync::Mutex::new(()),
            selector,
            config,
        }
    }

    /// Create a service and bring up a generation, reusing the persisted one
    /// when the catalog has not changed.
    pub async fn open(config: VitrineConfig) -> Result<Self> {
        let service = Self::new(config)?;
        service.rebuild(false).await?;
        Ok(service)
    }

    pub fn config(&self) -> &VitrineConfig {
        &self.config
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// The generation currently answering queries.
    pub fn current(&self) -> Option<Arc<IndexGeneration>> {
        self.publisher.current()
    }

    /// Reload the catalog from the configured path and rebuild.
    pub async fn rebuild(&self, force: bool) -> Result<RebuildReport> {
        let catalog = CatalogLoader::load(&self.config.catalog.path)?;
        self.rebuild_from(catalog, force).await
    }

    /// Rebuild from an already loaded catalog.
    ///
    /// Without `force`, a served or persisted generation built from the same
    /// catalog is reused as long as its backends are still registered.
    pub async fn rebuild_from(&self, catalog: CatalogStore, force: bool) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.lock().await;
        let started = Instant::now();
        let fingerprint = catalog.fingerprint()?;

        if !force {
            if let Some(report) = self.try_reuse(fingerprint) {
                return Ok(report);
            }
        }

        let generation = Arc::new(self.selector.build(Arc::new(catalog)).await?);
        let persisted = match self.store.save(&generation) {
            Ok(()) => true,
            Err(err) => {
                warn!("generation {} not persisted: {err}", generation.id());
                false
            }
        };
        let previous = self.publisher.publish(generation.clone());
        info!(
            "published generation {} in {:.2?} (replaced {})",
            generation.id(),
            started.elapsed(),
            previous.map_or_else(|| "nothing".to_string(), |p| p.id().to_string())
        );

        Ok(RebuildReport {
            generation: generation.info(),
            reused: false,
            persisted,
        })
    }

    fn try_reuse(&self, fingerprint: u32) -> Option<RebuildReport> {
        if let Some(current) = self.publisher.current() {
            if current.fingerprint() == fingerprint && self.selector.can_serve(&current) {
                info!("catalog unchanged, keeping generation {}", current.id());
                let persisted =
                    matches!(self.store.current_id(), Ok(Some(id)) if id == current.id());
                return Some(RebuildReport {
                    generation: current.info(),
                    reused: true,
                    persisted,
                });
            }
        }

        let persisted = match self.store.load_current() {
            Ok(Some(generation)) => generation,
            Ok(None) => return None,
            Err(err) => {
                warn!("ignoring persisted generation: {err}");
                return None;
            }
        };
        if persisted.fingerprint() != fingerprint {
            info!("catalog changed since generation {}, rebuilding", persisted.id());
            return None;
        }
        if !self.selector.can_serve(&persisted) {
            info!(
                "backends of generation {} are no longer registered, rebuilding",
                persisted.id()
            );
            return None;
        }

        let persisted = Arc::new(persisted);
        self.publisher.publish(persisted.clone());
        info!("reusing persisted generation {}", persisted.id());
        Some(RebuildReport {
            generation: persisted.info(),
            reused: true,
            persisted: true,
        })
    }

    pub async fn text_search(&self, request: &TextSearchRequest) -> SearchResponse {
        let Some(generation) = self.publisher.current() else {
            return SearchResponse::degraded("no index generation is being served", None);
        };
        let identity = &generation.text().identity;
        let Some(encoder) = self.selector.text_encoder_for(identity) else {
            return SearchResponse::degraded(
                format!("text backend {identity} is not registered"),
                Some(generation.id()),
            );
        };

        TextSearchEngine::new(&generation, encoder, &self.scorer, &self.config.search)
            .run(request)
            .await
    }

    pub async fn vision_search(&self, request: &VisionSearchRequest) -> SearchResponse {
        let Some(generation) = self.publisher.current() else {
            return SearchResponse::degraded("no index generation is being served", None);
        };
        let Some(section) = generation.vision() else {
            return SearchResponse::degraded(
                "generation has no vision index",
                Some(generation.id()),
            );
        };
        let Some(encoder) = self.selector.image_encoder_for(&section.identity) else {
            return SearchResponse::degraded(
                format!("image backend {} is not registered", section.identity),
                Some(generation.id()),
            );
        };

        let image =
            match resolve_payload(&request.payload, self.config.vision.fetch_timeout()).await {
                Ok(image) => image,
                Err(err) => {
                    warn!("vision query degraded: {err}");
                    return SearchResponse::degraded(err.to_string(), Some(generation.id()));
                }
            };

        VisionSearchEngine::new(&generation, encoder, &self.scorer, &self.config.search)
            .run(&image, request.top_k)
            .await
    }
}
