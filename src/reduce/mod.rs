//! Dimensionality reduction of embedding batches to 2D.
//!
//! [`reduce`] validates the batch, derives the t-SNE perplexity from the batch
//! size with [`neighborhood_for`], and runs the seeded [`tsne`] projection.
//! Output order always matches input order.

pub mod tsne;

use serde::Serialize;

use crate::config::ReductionConfig;

/// Upper bound for the neighborhood (perplexity) parameter.
pub const DEFAULT_NEIGHBORHOOD: usize = 5;

/// Fewest vectors a reduction accepts.
pub const MIN_POINTS: usize = 2;

/// A point in the reduced 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReduceError {
    #[error("insufficient data: need at least {min} vectors to reduce, got {got}")]
    InsufficientData { min: usize, got: usize },

    #[error("dimension mismatch: vector {index} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("vector {index} has zero dimensions")]
    EmptyVector { index: usize },

    #[error("reduction produced non-finite coordinates")]
    NonFinite,
}

/// Neighborhood parameter for a batch of `n` vectors: `min(upper, n - 1)`.
///
/// The locality parameter must stay below the number of available neighbors.
pub fn neighborhood_for(n: usize, upper: usize) -> usize {
    upper.min(n.saturating_sub(1)).max(1)
}

/// Project `vectors` to 2D with t-SNE using the configured seed and schedule.
pub fn reduce(vectors: &[Vec<f32>], config: &ReductionConfig) -> Result<Vec<Point2D>, ReduceError> {
    let n = vectors.len();
    if n < MIN_POINTS {
        return Err(ReduceError::InsufficientData {
            min: MIN_POINTS,
            got: n,
        });
    }

    let dim = vectors[0].len();
    if dim == 0 {
        return Err(ReduceError::EmptyVector { index: 0 });
    }
    if let Some((index, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(ReduceError::DimensionMismatch {
            index,
            expected: dim,
            got: v.len(),
        });
    }

    let perplexity = neighborhood_for(n, config.perplexity.max(1));
    let params = tsne::TsneParams {
        perplexity: perplexity as f64,
        seed: config.seed,
        max_iter: config.max_iter,
        learning_rate: config.learning_rate,
        early_exaggeration: config.early_exaggeration,
    };

    tracing::debug!(points = n, dim, perplexity, seed = config.seed, "running t-SNE");

    let embedded = tsne::fit_transform(vectors, &params);
    if embedded.iter().any(|v| !v.is_finite()) {
        return Err(ReduceError::NonFinite);
    }

    Ok(embedded
        .rows()
        .into_iter()
        .map(|row| Point2D {
            x: row[0],
            y: row[1],
        })
        .collect())
}
