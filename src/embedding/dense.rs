//! In-process dense text encoder based on signed feature hashing.
//!
//! Word unigrams, word bigrams and character trigrams are hashed (CRC32) into a
//! fixed number of buckets with a hash-derived sign, then L2-normalized. No
//! model files are needed and the output is stable across processes, which
//! matters because query vectors are produced long after the corpus.

use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;

use crate::analysis::{char_trigrams, tokenize};
use crate::embedding::backend::{
    BackendIdentity, BackendKind, EncodePool, EncoderState, TextCorpusEncoding, TextEncoder,
};
use crate::error::{Result, VitrineError};
use crate::vector::Vector;

const SIGN_SEED: u32 = 0x9e37_79b9;
const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.75;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct LocalDenseEncoder {
    dimension: usize,
    pool: EncodePool,
}

impl LocalDenseEncoder {
    pub fn new(dimension: usize, pool: EncodePool) -> Result<Self> {
        if dimension == 0 {
            return Err(VitrineError::invalid_argument(
                "local dense dimension must be at least 1",
            ));
        }
        Ok(Self { dimension, pool })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn encode_text(&self, text: &str) -> Vector {
        hashed_embedding(text, self.dimension)
    }
}

fn add_feature(buckets: &mut [f32], feature: &str, weight: f32) {
    let bucket = crc32fast::hash(feature.as_bytes()) as usize % buckets.len();
    let mut hasher = crc32fast::Hasher::new_with_initial(SIGN_SEED);
    hasher.update(feature.as_bytes());
    let sign = if hasher.finalize() & 1 == 0 { 1.0 } else { -1.0 };
    buckets[bucket] += sign * weight;
}

fn hashed_embedding(text: &str, dimension: usize) -> Vector {
    let tokens = tokenize(text);
    let mut buckets = vec![0.0f32; dimension];
    for token in &tokens {
        add_feature(&mut buckets, token, UNIGRAM_WEIGHT);
        for trigram in char_trigrams(token) {
            add_feature(&mut buckets, &trigram, TRIGRAM_WEIGHT);
        }
    }
    for pair in tokens.windows(2) {
        add_feature(&mut buckets, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
    }
    Vector::new(buckets).normalized()
}

#[async_trait]
impl TextEncoder for LocalDenseEncoder {
    fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(BackendKind::LocalDense, format!("hash-{}", self.dimension))
    }

    async fn encode_corpus(&self, texts: Arc<[String]>) -> Result<TextCorpusEncoding> {
        let dimension = self.dimension;
        let vectors = self
            .pool
            .run(move || {
                texts
                    .par_iter()
                    .map(|text| hashed_embedding(text, dimension))
                    .collect::<Vec<_>>()
            })
            .await?;
        Ok(TextCorpusEncoding {
            vectors,
            state: EncoderState::Stateless,
        })
    }

    async fn encode_query(&self, text: &str, _state: &EncoderState) -> Result<Vector> {
        Ok(self.encode_text(text))
    }
}
