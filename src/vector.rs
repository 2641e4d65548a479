//! Dense vectors and the similarity measures used by the backends.
//!
//! Dot products and histogram intersections run eight lanes at a time through
//! `wide`, with a scalar tail.

use serde::{Deserialize, Serialize};
use wide::f32x8;

/// Similarity measure native to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine similarity over L2-normalized vectors, in [-1, 1].
    Cosine,
    /// Histogram intersection over L1-normalized histograms, in [0, 1].
    HistogramIntersection,
}

impl Similarity {
    pub fn compare(&self, a: &Vector, b: &Vector) -> f32 {
        match self {
            Similarity::Cosine => a.cosine_similarity(b),
            Similarity::HistogramIntersection => a.histogram_intersection(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(dimension: usize) -> Self {
        Self {
            data: vec![0.0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// All components are finite.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn norm(&self) -> f32 {
        dot(&self.data, &self.data).sqrt()
    }

    /// Scale to unit L2 norm. Zero vectors are left untouched.
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.data {
                *v /= norm;
            }
        }
        self
    }

    /// Scale so components sum to one.
    pub fn l1_normalized(mut self) -> Self {
        let sum: f32 = self.data.iter().sum();
        let denom = sum + 1e-8;
        for v in &mut self.data {
            *v /= denom;
        }
        self
    }

    pub fn dot(&self, other: &Vector) -> f32 {
        dot(&self.data, &other.data)
    }

    /// Cosine similarity. Vectors of different dimension compare as 0.
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        self.dot(other) / denom
    }

    /// Sum of component-wise minima.
    pub fn histogram_intersection(&self, other: &Vector) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        let mut acc = f32x8::ZERO;
        let a_chunks = self.data.chunks_exact(8);
        let b_chunks = other.data.chunks_exact(8);
        let tail: f32 = a_chunks
            .remainder()
            .iter()
            .zip(b_chunks.remainder())
            .map(|(x, y)| x.min(*y))
            .sum();
        for (a, b) in a_chunks.zip(b_chunks) {
            acc += lanes(a).min(lanes(b));
        }
        acc.reduce_add() + tail
    }
}

fn lanes(chunk: &[f32]) -> f32x8 {
    let mut buf = [0.0f32; 8];
    buf.copy_from_slice(chunk);
    f32x8::from(buf)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = f32x8::ZERO;
    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();
    for (x, y) in a_chunks.zip(b_chunks) {
        acc += lanes(x) * lanes(y);
    }
    acc.reduce_add() + tail
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Vector::new((0..19).map(|i| i as f32).collect());
        assert!(approx(a.cosine_similarity(&a), 1.0));

        let b = Vector::new(a.data.iter().map(|v| -v).collect());
        assert!(approx(a.cosine_similarity(&b), -1.0));

        assert_eq!(a.cosine_similarity(&Vector::zeros(19)), 0.0);
        assert_eq!(a.cosine_similarity(&Vector::zeros(3)), 0.0);
    }

    #[test]
    fn test_histogram_intersection() {
        let a = Vector::new(vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = Vector::new(vec![0.25, 0.25, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(approx(a.histogram_intersection(&b), 0.5));
        assert!(approx(a.histogram_intersection(&a), 1.0));
    }

    #[test]
    fn test_normalization() {
        let v = Vector::new(vec![3.0, 4.0]).normalized();
        assert!(approx(v.norm(), 1.0));

        let h = Vector::new(vec![1.0, 3.0]).l1_normalized();
        assert!(approx(h.data.iter().sum(), 1.0));

        assert!(!Vector::new(vec![f32::NAN]).is_valid());
    }
}
