//! Catalog loading from JSON or CSV files.

use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::catalog::item::{Item, RawItem};
use crate::catalog::store::CatalogStore;
use crate::error::{Result, VitrineError};

/// CSV row layout. Tags are `;`-separated.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    image: Option<String>,
}

impl From<CsvRow> for RawItem {
    fn from(row: CsvRow) -> Self {
        RawItem {
            id: row.id,
            title: row.title,
            category: row.category,
            color: row.color,
            price: row.price,
            description: row.description,
            tags: row.tags.split(';').map(str::to_string).collect(),
            image: row.image,
        }
    }
}

pub struct CatalogLoader;

impl CatalogLoader {
    /// Load a catalog, choosing the format from the file extension.
    pub fn load(path: &Path) -> Result<CatalogStore> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let raw = match extension.as_str() {
            "json" => Self::read_json(path)?,
            "csv" => Self::read_csv(path)?,
            other => {
                return Err(VitrineError::invalid_argument(format!(
                    "unsupported catalog format '{other}' for {}",
                    path.display()
                )));
            }
        };

        let store = Self::from_raw(raw)?;
        info!("loaded {} catalog items from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn from_raw(raw: Vec<RawItem>) -> Result<CatalogStore> {
        CatalogStore::new(raw.into_iter().map(Item::from).collect())
    }

    pub fn from_json_str(json: &str) -> Result<CatalogStore> {
        let raw: Vec<RawItem> = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn read_json(path: &Path) -> Result<Vec<RawItem>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn read_csv(path: &Path) -> Result<Vec<RawItem>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut out = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            out.push(RawItem::from(row?));
        }
        Ok(out)
    }
}
