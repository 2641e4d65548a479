//! Hand-curated color/category corrections keyed by image file name.
//!
//! ```json
//! { "red_tote.jpg": { "color": "green", "category": "bags" } }
//! ```

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::catalog::{Category, Color};
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
struct RawOverride {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageOverride {
    pub color: Option<Color>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Default)]
pub struct ImageOverrides {
    entries: HashMap<String, ImageOverride>,
}

impl ImageOverrides {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, RawOverride> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(name, entry)| {
                let parsed = ImageOverride {
                    color: entry.color.as_deref().and_then(Color::parse),
                    category: entry.category.as_deref().and_then(Category::parse),
                };
                (name, parsed)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Load overrides from a file. A missing or malformed file yields no
    /// overrides, it never fails a build.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("ignoring overrides file {}: {err}", path.display());
                return Self::default();
            }
        };
        match Self::from_json_str(&content) {
            Ok(overrides) => {
                info!(
                    "loaded {} image overrides from {}",
                    overrides.len(),
                    path.display()
                );
                overrides
            }
            Err(err) => {
                warn!("ignoring malformed overrides file {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn get(&self, file_name: &str) -> Option<&ImageOverride> {
        self.entries.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let overrides = ImageOverrides::from_json_str(
            r#"{"a.jpg": {"color": "Grey"}, "b.jpg": {"category": "shoe", "color": "teal"}}"#,
        )
        .unwrap();
        assert_eq!(overrides.get("a.jpg").unwrap().color, Some(Color::Gray));
        let b = overrides.get("b.jpg").unwrap();
        assert_eq!(b.category, Some(Category::Shoes));
        assert_eq!(b.color, None);
        assert!(overrides.get("c.jpg").is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let overrides = ImageOverrides::load_or_default(Some(Path::new("/nonexistent/o.json")));
        assert!(overrides.is_empty());
        assert!(ImageOverrides::load_or_default(None).is_empty());
    }
}
