//! Hard structured filters and their relaxation policy.
//!
//! Category is never relaxed. When a category was requested and the fully
//! constrained set is empty, the color constraint alone is dropped and the
//! filter is retried. Price bounds are inclusive and never relaxed.

use bit_vec::BitVec;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogStore, Category, Color, Item};

/// Normalized hard constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constraints {
    pub category: Option<Category>,
    pub color: Option<Color>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl Constraints {
    /// Normalize raw constraint values. Unknown tokens and non-finite bounds
    /// are treated as absent.
    pub fn from_raw(
        category: Option<&str>,
        color: Option<&str>,
        min_price: Option<f64>,
        max_price: Option<f64>,
    ) -> Self {
        Self {
            category: category.and_then(Category::parse),
            color: color.and_then(Color::parse),
            min_price: min_price.filter(|p| p.is_finite()),
            max_price: max_price.filter(|p| p.is_finite()),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    fn without_color(&self) -> Self {
        Self {
            color: None,
            ..*self
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(category) = self.category {
            if item.category != Some(category) {
                return false;
            }
        }
        if let Some(color) = self.color {
            if item.color != Some(color) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if item.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if item.price > max {
                return false;
            }
        }
        true
    }
}

/// A constraint dropped to find candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dropped", rename_all = "snake_case")]
pub enum Relaxation {
    Color { color: Color },
}

/// Candidate set over catalog positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    candidates: BitVec,
    relaxation: Option<Relaxation>,
}

impl FilterOutcome {
    pub fn contains(&self, position: usize) -> bool {
        self.candidates.get(position).unwrap_or(false)
    }

    /// Candidate positions in catalog order.
    pub fn positions(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter_map(|(position, hit)| hit.then_some(position))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.iter().filter(|hit| *hit).count()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.none()
    }

    pub fn relaxation(&self) -> Option<Relaxation> {
        self.relaxation
    }
}

pub struct FilterEngine;

impl FilterEngine {
    pub fn apply(catalog: &CatalogStore, constraints: &Constraints) -> FilterOutcome {
        let candidates = Self::select(catalog, constraints);
        if !candidates.none() || constraints.category.is_none() {
            return FilterOutcome {
                candidates,
                relaxation: None,
            };
        }
        let Some(color) = constraints.color else {
            return FilterOutcome {
                candidates,
                relaxation: None,
            };
        };

        let relaxed = Self::select(catalog, &constraints.without_color());
        debug!(
            "no candidates for {constraints:?}, dropped color {color}: {} candidates",
            relaxed.iter().filter(|hit| *hit).count()
        );
        FilterOutcome {
            candidates: relaxed,
            relaxation: Some(Relaxation::Color { color }),
        }
    }

    fn select(catalog: &CatalogStore, constraints: &Constraints) -> BitVec {
        let mut bits = BitVec::from_elem(catalog.len(), false);
        for (position, item) in catalog.items().iter().enumerate() {
            if constraints.matches(item) {
                bits.set(position, true);
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLoader;

    fn catalog() -> CatalogStore {
        CatalogLoader::from_json_str(
            r#"[
                {"id": "s1", "title": "Runner", "category": "shoes", "color": "red", "price": 60},
                {"id": "s2", "title": "Trail", "category": "shoes", "color": "blue", "price": 90},
                {"id": "b1", "title": "Tote", "category": "bags", "color": "purple", "price": 20},
                {"id": "b2", "title": "Duffel", "category": "bags", "color": "black", "price": 50},
                {"id": "x", "title": "Mystery", "price": 5}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_unconstrained_keeps_everything() {
        let outcome = FilterEngine::apply(&catalog(), &Constraints::default());
        assert_eq!(outcome.len(), 5);
        assert!(outcome.relaxation().is_none());
    }

    #[test]
    fn test_unknown_tokens_are_no_constraint() {
        let constraints = Constraints::from_raw(Some("hats"), Some("teal"), None, None);
        assert!(constraints.is_unconstrained());
    }

    #[test]
    fn test_case_insensitive_tokens() {
        let constraints = Constraints::from_raw(Some("Shoe"), Some("RED"), None, None);
        let outcome = FilterEngine::apply(&catalog(), &constraints);
        assert_eq!(outcome.positions(), vec![0]);
    }

    #[test]
    fn test_price_bounds_are_inclusive() {
        let constraints = Constraints::from_raw(None, None, Some(50.0), Some(60.0));
        let outcome = FilterEngine::apply(&catalog(), &constraints);
        assert_eq!(outcome.positions(), vec![0, 3]);
    }

    #[test]
    fn test_color_relaxed_within_category() {
        let constraints = Constraints::from_raw(Some("shoes"), Some("purple"), None, None);
        let outcome = FilterEngine::apply(&catalog(), &constraints);
        assert_eq!(outcome.positions(), vec![0, 1]);
        assert_eq!(
            outcome.relaxation(),
            Some(Relaxation::Color {
                color: Color::Purple
            })
        );
    }

    #[test]
    fn test_no_relaxation_without_category() {
        let constraints = Constraints::from_raw(None, Some("green"), None, None);
        let outcome = FilterEngine::apply(&catalog(), &constraints);
        assert!(outcome.is_empty());
        assert!(outcome.relaxation().is_none());
    }

    #[test]
    fn test_relaxation_keeps_price() {
        let constraints = Constraints::from_raw(Some("shoes"), Some("purple"), None, Some(30.0));
        let outcome = FilterEngine::apply(&catalog(), &constraints);
        assert!(outcome.is_empty());
        assert!(outcome.relaxation().is_some());
    }
}
