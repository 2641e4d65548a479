use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::vocabulary::{Category, Color};

/// A catalog item as served by one index generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub category: Option<Category>,
    pub color: Option<Color>,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Image reference, relative to the configured image root.
    #[serde(default)]
    pub image: Option<String>,
}

impl Item {
    /// Text that similarity backends encode for this item.
    pub fn text_blob(&self) -> String {
        let category = self.category.map(|c| c.as_str()).unwrap_or_default();
        let color = self.color.map(|c| c.as_str()).unwrap_or_default();
        [
            self.title.as_str(),
            self.description.as_str(),
            category,
            color,
        ]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// An item as handed over by the catalog loader, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "image_path")]
    pub image: Option<String>,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let tags = raw
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Item {
            id: raw.id.trim().to_string(),
            title: raw.title,
            category: raw.category.as_deref().and_then(Category::parse),
            color: raw.color.as_deref().and_then(Color::parse),
            price: raw.price,
            description: raw.description,
            tags,
            image: raw.image.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_item_normalization() {
        let raw = RawItem {
            id: " sku-1 ".to_string(),
            title: "Trail Runner".to_string(),
            category: Some("Shoe".to_string()),
            color: Some("teal".to_string()),
            price: 59.0,
            tags: vec!["Running".to_string(), " ".to_string()],
            ..Default::default()
        };
        let item = Item::from(raw);
        assert_eq!(item.id, "sku-1");
        assert_eq!(item.category, Some(Category::Shoes));
        assert_eq!(item.color, None);
        assert_eq!(item.tags.iter().collect::<Vec<_>>(), vec!["running"]);
    }

    #[test]
    fn test_text_blob_skips_missing_parts() {
        let item = Item {
            id: "1".to_string(),
            title: "Canvas Tote".to_string(),
            category: Some(Category::Bags),
            color: None,
            price: 20.0,
            description: String::new(),
            tags: BTreeSet::new(),
            image: None,
        };
        assert_eq!(item.text_blob(), "Canvas Tote bags");
    }
}
