//! Immutable index generations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{CatalogStore, Category, Color};
use crate::embedding::backend::{BackendIdentity, EncoderState};
use crate::error::{Result, VitrineError};
use crate::vector::Vector;

/// Text vectors for every catalog item, produced by one backend.
#[derive(Debug, Clone)]
pub struct TextSection {
    pub identity: BackendIdentity,
    pub state: EncoderState,
    /// Indexed by catalog position.
    pub vectors: Vec<Vector>,
}

/// Per-image metadata for one catalog item with a loadable image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionEntry {
    /// Catalog position of the item.
    pub position: usize,
    pub category: Option<Category>,
    /// Resolved color used for color matching.
    pub color: Color,
    /// Color detected from the pixels.
    pub dominant_color: Color,
    pub histogram: Vector,
}

/// Image vectors for the items that have an image, produced by one backend.
#[derive(Debug, Clone)]
pub struct VisionSection {
    pub identity: BackendIdentity,
    pub entries: Vec<VisionEntry>,
    /// Parallel to `entries`.
    pub vectors: Vec<Vector>,
}

/// One immutable, atomically-published build of the index.
#[derive(Debug)]
pub struct IndexGeneration {
    id: Uuid,
    built_at: DateTime<Utc>,
    fingerprint: u32,
    catalog: Arc<CatalogStore>,
    text: TextSection,
    vision: Option<VisionSection>,
}

impl IndexGeneration {
    pub fn new(
        catalog: Arc<CatalogStore>,
        text: TextSection,
        vision: Option<VisionSection>,
    ) -> Result<Self> {
        let fingerprint = catalog.fingerprint()?;
        Self::from_parts(Uuid::new_v4(), Utc::now(), fingerprint, catalog, text, vision)
    }

    /// Reassemble a generation, checking that every section lines up with the catalog.
    pub fn from_parts(
        id: Uuid,
        built_at: DateTime<Utc>,
        fingerprint: u32,
        catalog: Arc<CatalogStore>,
        text: TextSection,
        vision: Option<VisionSection>,
    ) -> Result<Self> {
        if text.vectors.len() != catalog.len() {
            return Err(VitrineError::internal(format!(
                "text section has {} vectors for {} items",
                text.vectors.len(),
                catalog.len()
            )));
        }
        if let Some(vision) = &vision {
            if vision.vectors.len() != vision.entries.len() {
                return Err(VitrineError::internal(format!(
                    "vision section has {} vectors for {} entries",
                    vision.vectors.len(),
                    vision.entries.len()
                )));
            }
            if vision.entries.iter().any(|e| e.position >= catalog.len()) {
                return Err(VitrineError::internal(
                    "vision entry points outside the catalog",
                ));
            }
        }
        Ok(Self {
            id,
            built_at,
            fingerprint,
            catalog,
            text,
            vision,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Fingerprint of the catalog this generation was built from.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn text(&self) -> &TextSection {
        &self.text
    }

    pub fn vision(&self) -> Option<&VisionSection> {
        self.vision.as_ref()
    }

    pub fn info(&self) -> GenerationInfo {
        GenerationInfo {
            id: self.id,
            built_at: self.built_at,
            items: self.catalog.len(),
            text_backend: self.text.identity.to_string(),
            vision_backend: self.vision.as_ref().map(|v| v.identity.to_string()),
            images: self.vision.as_ref().map_or(0, |v| v.entries.len()),
        }
    }
}

/// Summary of a generation for reports and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub id: Uuid,
    pub built_at: DateTime<Utc>,
    pub items: usize,
    pub text_backend: String,
    pub vision_backend: Option<String>,
    pub images: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLoader;
    use crate::embedding::backend::BackendKind;

    fn catalog() -> Arc<CatalogStore> {
        Arc::new(
            CatalogLoader::from_json_str(
                r#"[{"id": "a", "title": "Red cap", "price": 10.0},
                    {"id": "b", "title": "Blue bag", "price": 30.0}]"#,
            )
            .unwrap(),
        )
    }

    fn text(n: usize) -> TextSection {
        TextSection {
            identity: BackendIdentity::new(BackendKind::LocalDense, "hash-2"),
            state: EncoderState::Stateless,
            vectors: vec![Vector::new(vec![1.0, 0.0]); n],
        }
    }

    #[test]
    fn test_info() {
        let generation = IndexGeneration::new(catalog(), text(2), None).unwrap();
        let info = generation.info();
        assert_eq!(info.items, 2);
        assert_eq!(info.text_backend, "local_dense/hash-2");
        assert_eq!(info.vision_backend, None);
        assert_eq!(generation.fingerprint(), catalog().fingerprint().unwrap());
    }

    #[test]
    fn test_rejects_misaligned_sections() {
        assert!(IndexGeneration::new(catalog(), text(1), None).is_err());

        let vision = VisionSection {
            identity: BackendIdentity::new(BackendKind::PerceptualColor, "hsv-12x6x6"),
            entries: vec![VisionEntry {
                position: 5,
                category: None,
                color: Color::Red,
                dominant_color: Color::Red,
                histogram: Vector::zeros(4),
            }],
            vectors: vec![Vector::zeros(4)],
        };
        assert!(IndexGeneration::new(catalog(), text(2), Some(vision)).is_err());
    }
}
