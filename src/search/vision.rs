//! Image search over the vision section of a generation.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::SearchConfig;
use crate::embedding::backend::{BackendKind, ImageEncoder};
use crate::error::{Result, VitrineError};
use crate::index::IndexGeneration;
use crate::search::request::{ImagePayload, RankedItem, SearchResponse};
use crate::search::scorer::{Scored, Scorer};
use crate::vision::ImageFeatures;
use crate::vision::image::{PreparedImage, fetch_url, file_name};

/// Turn a query payload into a decoded image.
pub async fn resolve_payload(
    payload: &ImagePayload,
    fetch_timeout: Duration,
) -> Result<PreparedImage> {
    match payload {
        ImagePayload::Bytes(bytes) => PreparedImage::decode(bytes.clone(), None),
        ImagePayload::Url(url) => {
            let bytes = fetch_url(url, fetch_timeout).await?;
            PreparedImage::decode(bytes, file_name(url))
        }
        ImagePayload::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                VitrineError::fetch_failure(format!("{}: {e}", path.display()))
            })?;
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            PreparedImage::decode(bytes, name)
        }
    }
}

pub struct VisionSearchEngine<'a> {
    generation: &'a IndexGeneration,
    encoder: Arc<dyn ImageEncoder>,
    scorer: &'a Scorer,
    search: &'a SearchConfig,
}

impl<'a> VisionSearchEngine<'a> {
    /// `encoder` must be the backend whose identity the generation's vision
    /// section records.
    pub fn new(
        generation: &'a IndexGeneration,
        encoder: Arc<dyn ImageEncoder>,
        scorer: &'a Scorer,
        search: &'a SearchConfig,
    ) -> Self {
        Self {
            generation,
            encoder,
            scorer,
            search,
        }
    }

    pub async fn run(&self, image: &PreparedImage, top_k: Option<usize>) -> SearchResponse {
        let Some(section) = self.generation.vision() else {
            return SearchResponse::degraded(
                "generation has no vision index",
                Some(self.generation.id()),
            );
        };
        let top_k = self.search.clamp_top_k(top_k, self.search.vision_top_k);

        let query = match self.encoder.encode_query(image).await {
            Ok(query) => query,
            Err(err) => {
                return SearchResponse::degraded(
                    format!("query encoding failed: {err}"),
                    Some(self.generation.id()),
                );
            }
        };
        let features = ImageFeatures::extract(image);
        debug!(
            "vision query {:?}: detected color {}",
            image.name(),
            features.dominant_color
        );

        let config = self.scorer.config();
        let similarity = section.identity.similarity();
        let blend_histogram = section.identity.kind == BackendKind::VisualEmbedding;

        let base: Vec<f32> = section
            .entries
            .iter()
            .zip(&section.vectors)
            .map(|(entry, vector)| {
                let mut score = similarity.compare(&query, vector);
                if blend_histogram {
                    score += config.histogram_blend
                        * features.histogram.histogram_intersection(&entry.histogram);
                }
                score
            })
            .collect();

        let neighbours: Vec<_> = section
            .entries
            .iter()
            .zip(&base)
            .map(|(entry, score)| (entry.category, *score, entry.position))
            .collect();
        let prior = self.scorer.category_prior(&neighbours);

        let scored: Vec<Scored> = section
            .entries
            .iter()
            .zip(&base)
            .map(|(entry, base)| {
                let category_boost = entry
                    .category
                    .and_then(|c| prior.get(&c).copied())
                    .unwrap_or(0.0);
                let color_boost = self
                    .scorer
                    .color_boost(entry.color, features.dominant_color);
                Scored {
                    position: entry.position,
                    score: base + category_boost + color_boost,
                }
            })
            .collect();

        let catalog = self.generation.catalog();
        let hits: Vec<RankedItem> = self
            .scorer
            .rank(scored, top_k)
            .into_iter()
            .filter_map(|s| {
                catalog.get(s.position).map(|item| RankedItem {
                    item: item.clone(),
                    score: s.score,
                })
            })
            .collect();

        let mut response = SearchResponse::ranked(hits, None, self.generation.id());
        response.detected_color = Some(features.dominant_color);
        response
    }
}
