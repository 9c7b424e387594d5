//! Cosine similarity between embedding vectors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    #[error("dimension mismatch: query has {expected} dimensions, record has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector has zero or non-finite norm")]
    ZeroNorm,
}

/// `dot(a, b) / (|a| * |b|)`, accumulated in `f64`.
///
/// Both vectors must have the same length and a finite, non-zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !denom.is_finite() || denom <= f64::EPSILON || !dot.is_finite() {
        return Err(SimilarityError::ZeroNorm);
    }

    // Rounding can push |v . v| / |v|^2 a hair past 1.
    Ok((dot / denom).clamp(-1.0, 1.0) as f32)
}
