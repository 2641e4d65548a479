//! On-disk generations.
//!
//! Layout under the cache directory:
//!
//! ```text
//! generations/
//!   CURRENT                  id of the served generation
//!   <uuid>/manifest.json     catalog, identities, encoder state, checksums
//!   <uuid>/text.bin          little-endian vectors
//!   <uuid>/vision.bin
//!   <uuid>/histograms.bin
//! ```
//!
//! A generation directory is fully written before `CURRENT` is replaced, and
//! `CURRENT` is replaced by renaming a temp file over it, so a reader sees
//! either the old generation or the new one.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::catalog::{CatalogStore, Category, Color, Item};
use crate::embedding::backend::{BackendIdentity, EncoderState};
use crate::error::{Result, VitrineError};
use crate::index::generation::{IndexGeneration, TextSection, VisionEntry, VisionSection};
use crate::vector::Vector;

const FORMAT_VERSION: u32 = 1;
const CURRENT_FILE: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const TEXT_VECTORS: &str = "text.bin";
const VISION_VECTORS: &str = "vision.bin";
const HISTOGRAMS: &str = "histograms.bin";

#[derive(Debug, Serialize, Deserialize)]
struct VectorFile {
    file: String,
    count: usize,
    dimension: usize,
    checksum: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextManifest {
    identity: BackendIdentity,
    state: EncoderState,
    vectors: VectorFile,
}

#[derive(Debug, Serialize, Deserialize)]
struct VisionEntryRecord {
    position: usize,
    category: Option<Category>,
    color: Color,
    dominant_color: Color,
}

#[derive(Debug, Serialize, Deserialize)]
struct VisionManifest {
    identity: BackendIdentity,
    entries: Vec<VisionEntryRecord>,
    vectors: VectorFile,
    histograms: VectorFile,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    id: Uuid,
    built_at: DateTime<Utc>,
    fingerprint: u32,
    items: Vec<Item>,
    text: TextManifest,
    vision: Option<VisionManifest>,
}

/// Reads and writes generations under `<cache>/generations`.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    root: PathBuf,
}

impl GenerationStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: cache_dir.join("generations"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `generation`, point `CURRENT` at it, and remove older generations.
    pub fn save(&self, generation: &IndexGeneration) -> Result<()> {
        let dir = self.root.join(generation.id().to_string());
        fs::create_dir_all(&dir)?;

        let text = TextManifest {
            identity: generation.text().identity.clone(),
            state: generation.text().state.clone(),
            vectors: write_vectors(&dir, TEXT_VECTORS, &generation.text().vectors)?,
        };
        let vision = match generation.vision() {
            Some(section) => {
                let histograms: Vec<Vector> =
                    section.entries.iter().map(|e| e.histogram.clone()).collect();
                Some(VisionManifest {
                    identity: section.identity.clone(),
                    entries: section
                        .entries
                        .iter()
                        .map(|e| VisionEntryRecord {
                            position: e.position,
                            category: e.category,
                            color: e.color,
                            dominant_color: e.dominant_color,
                        })
                        .collect(),
                    vectors: write_vectors(&dir, VISION_VECTORS, &section.vectors)?,
                    histograms: write_vectors(&dir, HISTOGRAMS, &histograms)?,
                })
            }
            None => None,
        };

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            id: generation.id(),
            built_at: generation.built_at(),
            fingerprint: generation.fingerprint(),
            items: generation.catalog().items().to_vec(),
            text,
            vision,
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        let mut pointer = NamedTempFile::new_in(&self.root)?;
        pointer.write_all(generation.id().to_string().as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(self.root.join(CURRENT_FILE))
            .map_err(|e| VitrineError::Io(e.error))?;
        info!("persisted generation {} to {}", generation.id(), dir.display());

        self.remove_stale(generation.id());
        Ok(())
    }

    /// Id recorded in `CURRENT`, if any.
    pub fn current_id(&self) -> Result<Option<Uuid>> {
        let path = self.root.join(CURRENT_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Uuid::parse_str(content.trim())
            .map(Some)
            .map_err(|e| VitrineError::internal(format!("corrupt {CURRENT_FILE} pointer: {e}")))
    }

    /// Load the generation `CURRENT` points at. `Ok(None)` when nothing was persisted.
    pub fn load_current(&self) -> Result<Option<IndexGeneration>> {
        let Some(id) = self.current_id()? else {
            return Ok(None);
        };
        let dir = self.root.join(id.to_string());
        let manifest: Manifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(VitrineError::internal(format!(
                "unsupported generation format {}",
                manifest.format_version
            )));
        }
        if manifest.id != id {
            return Err(VitrineError::internal(format!(
                "manifest id {} does not match {CURRENT_FILE} {id}",
                manifest.id
            )));
        }

        let catalog = Arc::new(CatalogStore::new(manifest.items)?);
        if catalog.fingerprint()? != manifest.fingerprint {
            return Err(VitrineError::internal(
                "persisted catalog does not match its fingerprint",
            ));
        }

        let text = TextSection {
            identity: manifest.text.identity,
            state: manifest.text.state,
            vectors: read_vectors(&dir, &manifest.text.vectors)?,
        };
        let vision = match manifest.vision {
            Some(section) => {
                let vectors = read_vectors(&dir, &section.vectors)?;
                let histograms = read_vectors(&dir, &section.histograms)?;
                if histograms.len() != section.entries.len() {
                    return Err(VitrineError::internal(
                        "histogram count does not match vision entries",
                    ));
                }
                let entries = section
                    .entries
                    .into_iter()
                    .zip(histograms)
                    .map(|(record, histogram)| VisionEntry {
                        position: record.position,
                        category: record.category,
                        color: record.color,
                        dominant_color: record.dominant_color,
                        histogram,
                    })
                    .collect();
                Some(VisionSection {
                    identity: section.identity,
                    entries,
                    vectors,
                })
            }
            None => None,
        };

        let generation = IndexGeneration::from_parts(
            manifest.id,
            manifest.built_at,
            manifest.fingerprint,
            catalog,
            text,
            vision,
        )?;
        debug!("loaded generation {id} from {}", dir.display());
        Ok(Some(generation))
    }

    fn remove_stale(&self, keep: Uuid) {
        let keep = keep.to_string();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("cannot list {}: {err}", self.root.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || entry.file_name().to_string_lossy() == keep {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!("removed stale generation {}", path.display()),
                Err(err) => warn!("cannot remove {}: {err}", path.display()),
            }
        }
    }
}

fn write_vectors(dir: &Path, file: &str, vectors: &[Vector]) -> Result<VectorFile> {
    let dimension = vectors.first().map_or(0, |v| v.dimension());
    let mut buf = Vec::with_capacity(8 + vectors.len() * dimension * 4);
    buf.write_u32::<LittleEndian>(vectors.len() as u32)?;
    buf.write_u32::<LittleEndian>(dimension as u32)?;
    for vector in vectors {
        if vector.dimension() != dimension {
            return Err(VitrineError::internal(format!(
                "{file}: mixed vector dimensions {} and {dimension}",
                vector.dimension()
            )));
        }
        for value in &vector.data {
            buf.write_f32::<LittleEndian>(*value)?;
        }
    }
    fs::write(dir.join(file), &buf)?;
    Ok(VectorFile {
        file: file.to_string(),
        count: vectors.len(),
        dimension,
        checksum: crc32fast::hash(&buf),
    })
}

fn read_vectors(dir: &Path, meta: &VectorFile) -> Result<Vec<Vector>> {
    let bytes = fs::read(dir.join(&meta.file))?;
    if crc32fast::hash(&bytes) != meta.checksum {
        return Err(VitrineError::internal(format!(
            "checksum mismatch in {}",
            meta.file
        )));
    }

    let mut reader = Cursor::new(bytes);
    let count = reader.read_u32::<LittleEndian>()? as usize;
    let dimension = reader.read_u32::<LittleEndian>()? as usize;
    if count != meta.count || dimension != meta.dimension {
        return Err(VitrineError::internal(format!(
            "{}: header {count}x{dimension} disagrees with manifest {}x{}",
            meta.file, meta.count, meta.dimension
        )));
    }

    let mut vectors = Vec::with_capacity(count);
    for _ in 0..count {
        let mut data = vec![0.0f32; dimension];
        reader.read_f32_into::<LittleEndian>(&mut data)?;
        vectors.push(Vector::new(data));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLoader;
    use crate::embedding::backend::BackendKind;
    use crate::embedding::lexical::TfIdfModel;

    fn generation() -> IndexGeneration {
        let catalog = Arc::new(
            CatalogLoader::from_json_str(
                r#"[{"id": "a", "title": "red cap", "price": 10, "tags": ["summer"]},
                    {"id": "b", "title": "blue bag", "price": 20}]"#,
            )
            .unwrap(),
        );
        let texts: Vec<String> = catalog.items().iter().map(|i| i.text_blob()).collect();
        let model = TfIdfModel::fit(&texts, 0.95, 2).unwrap();
        let text = TextSection {
            identity: BackendIdentity::new(BackendKind::Lexical, "tfidf-1-2"),
            vectors: texts.iter().map(|t| model.transform(t)).collect(),
            state: EncoderState::Lexical(model),
        };
        let vision = VisionSection {
            identity: BackendIdentity::new(BackendKind::PerceptualColor, "hsv-12x6x6"),
            entries: vec![VisionEntry {
                position: 1,
                category: Some(Category::Bags),
                color: Color::Blue,
                dominant_color: Color::Blue,
                histogram: Vector::new(vec![0.25, 0.75, 0.0]),
            }],
            vectors: vec![Vector::new(vec![0.25, 0.75, 0.0])],
        };
        IndexGeneration::new(catalog, text, Some(vision)).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path());
        assert!(store.load_current().unwrap().is_none());

        let original = generation();
        store.save(&original).unwrap();
        let loaded = store.load_current().unwrap().unwrap();

        assert_eq!(loaded.id(), original.id());
        assert_eq!(loaded.fingerprint(), original.fingerprint());
        assert_eq!(loaded.catalog().items(), original.catalog().items());
        assert_eq!(loaded.text().state, original.text().state);
        assert_eq!(loaded.text().vectors, original.text().vectors);
        assert_eq!(
            loaded.vision().unwrap().entries,
            original.vision().unwrap().entries
        );
    }

    #[test]
    fn test_save_replaces_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path());
        let first = generation();
        let second = generation();
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        assert_eq!(store.current_id().unwrap(), Some(second.id()));
        assert!(!store.root().join(first.id().to_string()).exists());
    }

    #[test]
    fn test_corrupted_vectors_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path());
        let original = generation();
        store.save(&original).unwrap();

        let path = store
            .root()
            .join(original.id().to_string())
            .join(TEXT_VECTORS);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(store.load_current().is_err());
    }
}
