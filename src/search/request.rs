//! Query requests and ranked responses.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Color, Item};
use crate::search::filter::Relaxation;

/// A free-text query with optional structured constraints.
///
/// Category and color are raw tokens as handed over by the intent parser;
/// tokens outside the canonical vocabularies mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSearchRequest {
    pub query: String,
    pub category: Option<String>,
    pub color: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub top_k: Option<usize>,
}

impl TextSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn min_price(mut self, min_price: f64) -> Self {
        self.min_price = Some(min_price);
        self
    }

    pub fn max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Where a query image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    /// Fetched with the configured fetch timeout.
    Url(String),
    /// A local file.
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionSearchRequest {
    pub payload: ImagePayload,
    pub top_k: Option<usize>,
}

impl VisionSearchRequest {
    pub fn new(payload: ImagePayload) -> Self {
        Self {
            payload,
            top_k: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// How a query ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// At least one item was ranked.
    Matched,
    /// The filters left no candidates, even after relaxation.
    NoMatches,
    /// The query could not be answered (fetch failure, encoder failure, no index).
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    #[serde(flatten)]
    pub item: Item,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<RankedItem>,
    pub outcome: SearchOutcome,
    /// Constraint dropped to find candidates, if any.
    pub relaxation: Option<Relaxation>,
    /// Dominant color of the query image (vision queries only).
    pub detected_color: Option<Color>,
    /// Generation that answered the query.
    pub generation: Option<Uuid>,
}

impl SearchResponse {
    pub fn ranked(
        hits: Vec<RankedItem>,
        relaxation: Option<Relaxation>,
        generation: Uuid,
    ) -> Self {
        let outcome = if hits.is_empty() {
            SearchOutcome::NoMatches
        } else {
            SearchOutcome::Matched
        };
        Self {
            hits,
            outcome,
            relaxation,
            detected_color: None,
            generation: Some(generation),
        }
    }

    pub fn no_matches(relaxation: Option<Relaxation>, generation: Uuid) -> Self {
        Self::ranked(Vec::new(), relaxation, generation)
    }

    pub fn degraded(reason: impl Into<String>, generation: Option<Uuid>) -> Self {
        Self {
            hits: Vec::new(),
            outcome: SearchOutcome::Degraded {
                reason: reason.into(),
            },
            relaxation: None,
            detected_color: None,
            generation,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, SearchOutcome::Degraded { .. })
    }

    /// Ids of the ranked items, in rank order.
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.item.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json_treats_missing_fields_as_absent() {
        let request: TextSearchRequest =
            serde_json::from_str(r#"{"query": "winter jacket", "max_price": 120}"#).unwrap();
        assert_eq!(request.query, "winter jacket");
        assert_eq!(request.max_price, Some(120.0));
        assert_eq!(request.category, None);
        assert_eq!(request.top_k, None);
    }

    #[test]
    fn test_outcome_serialization() {
        let response = SearchResponse::degraded("image fetch failed", None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"]["status"], "degraded");
        assert_eq!(json["outcome"]["reason"], "image fetch failed");
        assert!(response.is_degraded());
    }
}
