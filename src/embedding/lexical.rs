//! TF-IDF statistical text encoder, the last-resort text backend.
//!
//! The vocabulary and idf weights are fitted on the catalog at build time and
//! stored with the generation, so a query is always projected onto exactly the
//! model its corpus was encoded with.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{ngrams, tokenize};
use crate::config::LexicalConfig;
use crate::embedding::backend::{
    BackendIdentity, BackendKind, EncodePool, EncoderState, TextCorpusEncoding, TextEncoder,
};
use crate::error::{Result, VitrineError};
use crate::vector::Vector;

/// Fitted vocabulary and smoothed idf weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfModel {
    pub max_ngram: usize,
    /// Term to column index, columns in lexicographic term order.
    pub vocabulary: BTreeMap<String, u32>,
    pub idf: Vec<f32>,
}

impl TfIdfModel {
    /// Fit on a corpus. Terms whose document frequency exceeds `max_df` of the
    /// corpus are dropped.
    pub fn fit(texts: &[String], max_df: f32, max_ngram: usize) -> Result<Self> {
        let n_docs = texts.len();
        let mut doc_freq: AHashMap<String, usize> = AHashMap::new();
        for text in texts {
            let mut terms = ngrams(&tokenize(text), max_ngram);
            terms.sort_unstable();
            terms.dedup();
            for term in terms {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let max_count = (max_df as f64) * n_docs as f64;
        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| (*df as f64) <= max_count)
            .collect();
        kept.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        if kept.is_empty() && n_docs > 0 {
            return Err(VitrineError::backend_unavailable(
                BackendKind::Lexical.as_str(),
                "no terms remain after document-frequency pruning",
            ));
        }

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (column, (term, df)) in kept.into_iter().enumerate() {
            let weight = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0;
            idf.push(weight as f32);
            vocabulary.insert(term, column as u32);
        }

        Ok(Self {
            max_ngram,
            vocabulary,
            idf,
        })
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// Raw term counts weighted by idf, then L2-normalized. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> Vector {
        let mut data = vec![0.0f32; self.dimension()];
        for term in ngrams(&tokenize(text), self.max_ngram) {
            if let Some(&column) = self.vocabulary.get(&term) {
                data[column as usize] += 1.0;
            }
        }
        for (value, weight) in data.iter_mut().zip(&self.idf) {
            *value *= weight;
        }
        Vector::new(data).normalized()
    }
}

#[derive(Debug, Clone)]
pub struct LexicalEncoder {
    max_df: f32,
    max_ngram: usize,
    pool: EncodePool,
}

impl LexicalEncoder {
    pub fn new(config: &LexicalConfig, pool: EncodePool) -> Result<Self> {
        if !(config.max_df > 0.0 && config.max_df <= 1.0) {
            return Err(VitrineError::invalid_argument(format!(
                "lexical max_df must be in (0, 1], got {}",
                config.max_df
            )));
        }
        Ok(Self {
            max_df: config.max_df,
            max_ngram: config.max_ngram.clamp(1, 2),
            pool,
        })
    }
}

#[async_trait]
impl TextEncoder for LexicalEncoder {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::Lexical, format!("tfidf-1-{}", self.max_ngram))
    }

    async fn encode_corpus(&self, texts: Arc<[String]>) -> Result<TextCorpusEncoding> {
        let (max_df, max_ngram) = (self.max_df, self.max_ngram);
        self.pool
            .run(move || {
                let model = TfIdfModel::fit(&texts, max_df, max_ngram)?;
                let vectors = texts
                    .par_iter()
                    .map(|text| model.transform(text))
                    .collect();
                Ok(TextCorpusEncoding {
                    vectors,
                    state: EncoderState::Lexical(model),
                })
            })
            .await?
    }

    async fn encode_query(&self, text: &str, state: &EncoderState) -> Result<Vector> {
        match state {
            EncoderState::Lexical(model) => Ok(model.transform(text)),
            EncoderState::Stateless => Err(VitrineError::internal(
                "lexical query encoding requires a fitted model",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "red leather bag".to_string(),
            "blue canvas bag".to_string(),
            "red running shoes".to_string(),
        ]
    }

    #[test]
    fn test_fit_smooth_idf() {
        let model = TfIdfModel::fit(&corpus(), 0.95, 2).unwrap();
        // "bag" appears in 2 of 3 docs: ln(4/3) + 1
        let column = model.vocabulary["bag"] as usize;
        assert!((model.idf[column] - ((4.0f32 / 3.0).ln() + 1.0)).abs() < 1e-6);
        assert!(model.vocabulary.contains_key("running shoes"));
    }

    #[test]
    fn test_max_df_prunes_ubiquitous_terms() {
        let texts = vec!["cap red".to_string(), "cap blue".to_string()];
        let model = TfIdfModel::fit(&texts, 0.95, 1).unwrap();
        assert!(!model.vocabulary.contains_key("cap"));
        assert!(model.vocabulary.contains_key("red"));
    }

    #[test]
    fn test_fully_pruned_vocabulary_fails() {
        let texts = vec!["cap".to_string(), "cap".to_string()];
        let err = TfIdfModel::fit(&texts, 0.95, 1).unwrap_err();
        assert!(err.is_backend_unavailable());
        assert!(TfIdfModel::fit(&[], 0.95, 1).is_ok());
    }

    #[test]
    fn test_transform_ranks_matching_document_first() {
        let texts = corpus();
        let model = TfIdfModel::fit(&texts, 0.95, 2).unwrap();
        let query = model.transform("running shoes");
        let scores: Vec<f32> = texts
            .iter()
            .map(|t| model.transform(t).dot(&query))
            .collect();
        assert!(scores[2] > scores[0]);
        assert!(scores[2] > scores[1]);
        assert_eq!(model.transform("zzz unknown").norm(), 0.0);
    }
}
