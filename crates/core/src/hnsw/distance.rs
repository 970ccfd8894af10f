//! Distance functions for graph search.
//!
//! Any `Fn(&T, &T) -> f32 + Send + Sync` is a [`Distance`], so callers can plug
//! in closures or plain function pointers. [`Metric`] provides the common
//! vector metrics for `Vec<f32>` and `[f32]` items.
//!
//! All distances follow the convention **lower is closer**. Functions must be
//! pure: the same pair always yields the same value, and they may be called
//! from several query threads at once.

use serde::{Deserialize, Serialize};

/// A distance function over items of type `T`.
pub trait Distance<T: ?Sized>: Send + Sync {
    /// Distance between `a` and `b`. Lower = closer.
    fn distance(&self, a: &T, b: &T) -> f32;
}

impl<T: ?Sized, F> Distance<T> for F
where
    F: Fn(&T, &T) -> f32 + Send + Sync,
{
    #[inline]
    fn distance(&self, a: &T, b: &T) -> f32 {
        self(a, b)
    }
}

/// Built-in vector metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
    /// Squared Euclidean distance (L2²). Same ordering as `Euclidean`, no sqrt.
    SquaredEuclidean,
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    DotProduct,
}

impl Metric {
    /// Compute the metric between two equal-length slices.
    ///
    /// Slices of different length are compared over their common prefix.
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Euclidean => euclidean_sq(a, b).sqrt(),
            Metric::SquaredEuclidean => euclidean_sq(a, b),
            Metric::Cosine => 1.0 - cosine_similarity(a, b),
            Metric::DotProduct => -dot_product(a, b),
        }
    }
}

impl Distance<[f32]> for Metric {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.compute(a, b)
    }
}

impl Distance<Vec<f32>> for Metric {
    #[inline]
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> f32 {
        self.compute(a, b)
    }
}

/// Sum of squared differences, accumulated in 4 lanes.
#[inline]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let mut acc = [0.0f32; 4];
    let chunks = len / 4;
    for i in 0..chunks {
        let base = i * 4;
        for lane in 0..4 {
            let d = a[base + lane] - b[base + lane];
            acc[lane] += d * d;
        }
    }
    let mut sum = acc[0] + acc[1] + acc[2] + acc[3];
    for i in chunks * 4..len {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Dot product, accumulated in 4 lanes.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let mut acc = [0.0f32; 4];
    let chunks = len / 4;
    for i in 0..chunks {
        let base = i * 4;
        for lane in 0..4 {
            acc[lane] += a[base + lane] * b[base + lane];
        }
    }
    let mut sum = acc[0] + acc[1] + acc[2] + acc[3];
    for i in chunks * 4..len {
        sum += a[i] * b[i];
    }
    sum
}

/// Cosine similarity. Zero vectors have similarity 0 with everything.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
