//! Text search as an explicit state machine.
//!
//! `Idle -> Filtering -> Encoding -> Scoring -> Ranked`. Every query is an
//! independent run over one immutable generation; nothing survives a run.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;

use crate::analysis::tokenize;
use crate::config::SearchConfig;
use crate::embedding::backend::TextEncoder;
use crate::index::IndexGeneration;
use crate::search::filter::{Constraints, FilterEngine, FilterOutcome};
use crate::search::request::{RankedItem, SearchResponse, TextSearchRequest};
use crate::search::scorer::{Scored, Scorer};
use crate::vector::Vector;

#[derive(Debug)]
enum Stage {
    Idle,
    Filtering,
    Encoding {
        candidates: FilterOutcome,
    },
    Scoring {
        candidates: FilterOutcome,
        query: Vector,
    },
    Ranked(SearchResponse),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Filtering => "filtering",
            Stage::Encoding { .. } => "encoding",
            Stage::Scoring { .. } => "scoring",
            Stage::Ranked(_) => "ranked",
        }
    }
}

pub struct TextSearchEngine<'a> {
    generation: &'a IndexGeneration,
    encoder: Arc<dyn TextEncoder>,
    scorer: &'a Scorer,
    search: &'a SearchConfig,
}

impl<'a> TextSearchEngine<'a> {
    /// `encoder` must be the backend whose identity the generation's text
    /// section records.
    pub fn new(
        generation: &'a IndexGeneration,
        encoder: Arc<dyn TextEncoder>,
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

    pub async fn run(&self, request: &TextSearchRequest) -> SearchResponse {
        let query_text = if request.query.trim().is_empty() {
            self.search.default_query.as_str()
        } else {
            request.query.as_str()
        };
        let constraints = Constraints::from_raw(
            request.category.as_deref(),
            request.color.as_deref(),
            request.min_price,
            request.max_price,
        );
        let top_k = self
            .search
            .clamp_top_k(request.top_k, self.search.text_top_k);

        let mut stage = Stage::Idle;
        loop {
            debug!("text search '{query_text}': {}", stage.name());
            stage = match stage {
                Stage::Idle => Stage::Filtering,
                Stage::Filtering => {
                    let candidates =
                        FilterEngine::apply(self.generation.catalog(), &constraints);
                    if candidates.is_empty() {
                        Stage::Ranked(SearchResponse::no_matches(
                            candidates.relaxation(),
                            self.generation.id(),
                        ))
                    } else {
                        Stage::Encoding { candidates }
                    }
                }
                Stage::Encoding { candidates } => {
                    let section = self.generation.text();
                    match self.encoder.encode_query(query_text, &section.state).await {
                        Ok(query) => Stage::Scoring { candidates, query },
                        Err(err) => Stage::Ranked(SearchResponse::degraded(
                            format!("query encoding failed: {err}"),
                            Some(self.generation.id()),
                        )),
                    }
                }
                Stage::Scoring { candidates, query } => {
                    let hits = self.score(&candidates, &query, query_text, &constraints, top_k);
                    Stage::Ranked(SearchResponse::ranked(
                        hits,
                        candidates.relaxation(),
                        self.generation.id(),
                    ))
                }
                Stage::Ranked(response) => return response,
            };
        }
    }

    fn score(
        &self,
        candidates: &FilterOutcome,
        query: &Vector,
        query_text: &str,
        constraints: &Constraints,
        top_k: usize,
    ) -> Vec<RankedItem> {
        let section = self.generation.text();
        let similarity = section.identity.similarity();
        let catalog = self.generation.catalog();
        let query_tokens: BTreeSet<String> = tokenize(query_text).into_iter().collect();

        let scored: Vec<Scored> = candidates
            .positions()
            .into_iter()
            .filter_map(|position| {
                let item = catalog.get(position)?;
                let base = similarity.compare(query, &section.vectors[position]);
                let score = base
                    + self.scorer.tag_boost(&query_tokens, item)
                    + self.scorer.price_boost(item, constraints.max_price);
                Some(Scored { position, score })
            })
            .collect();

        self.scorer
            .rank(scored, top_k)
            .into_iter()
            .filter_map(|s| {
                catalog.get(s.position).map(|item| RankedItem {
                    item: item.clone(),
                    score: s.score,
                })
            })
            .collect()
    }
}
