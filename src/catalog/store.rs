use std::collections::HashSet;

use crate::catalog::item::Item;
use crate::error::{Result, VitrineError};

/// Immutable item list for one index generation.
///
/// Items are addressed by their position, which is also the tie-break order
/// used when ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStore {
    items: Vec<Item>,
}

impl CatalogStore {
    /// Validate structural invariants and take ownership of the items.
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.id.is_empty() {
                return Err(VitrineError::invalid_catalog("item with empty id"));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(VitrineError::invalid_catalog(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(VitrineError::invalid_catalog(format!(
                    "item '{}' has invalid price {}",
                    item.id, item.price
                )));
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&Item> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// CRC32 over the canonical JSON of the items.
    pub fn fingerprint(&self) -> Result<u32> {
        let bytes = serde_json::to_vec(&self.items)?;
        Ok(crc32fast::hash(&bytes))
    }
}
