//! HSV histogram image encoder, the last-resort vision backend.

use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;

use crate::embedding::backend::{BackendIdentity, BackendKind, EncodePool, ImageEncoder};
use crate::error::Result;
use crate::vector::Vector;
use crate::vision::histogram::{HUE_BINS, SATURATION_BINS, VALUE_BINS, hsv_histogram};
use crate::vision::image::PreparedImage;

#[derive(Debug, Clone)]
pub struct PerceptualColorEncoder {
    pool: EncodePool,
}

impl PerceptualColorEncoder {
    pub fn new(pool: EncodePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageEncoder for PerceptualColorEncoder {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(
            BackendKind::PerceptualColor,
            format!("hsv-{HUE_BINS}x{SATURATION_BINS}x{VALUE_BINS}"),
        )
    }

    async fn encode_corpus(&self, images: Arc<[PreparedImage]>) -> Result<Vec<Vector>> {
        self.pool
            .run(move || {
                images
                    .par_iter()
                    .map(|image| hsv_histogram(image.pixels()))
                    .collect()
            })
            .await
    }

    async fn encode_query(&self, image: &PreparedImage) -> Result<Vector> {
        Ok(hsv_histogram(image.pixels()))
    }
}
