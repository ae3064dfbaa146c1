//! Exact t-SNE (van der Maaten & Hinton, 2008) over dense `ndarray` matrices.
//!
//! O(N²) per iteration, which is fine for the small batches this service
//! plots. Early exaggeration and the low momentum both end after iteration
//! 250; gains adapt per coordinate throughout.

use ndarray::{Array2, Axis};

const EXAGGERATION_ITERS: usize = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const INIT_STD: f64 = 1e-4;
const PERPLEXITY_TOL: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
const EPSILON: f64 = f64::EPSILON;

#[derive(Debug, Clone)]
pub struct TsneParams {
    pub perplexity: f64,
    pub seed: u64,
    pub max_iter: usize,
    /// `None` selects `max(N / early_exaggeration / 4, 50)`.
    pub learning_rate: Option<f64>,
    pub early_exaggeration: f64,
}

/// Embed `vectors` into 2D. Rows of the result follow the input order.
pub fn fit_transform(vectors: &[Vec<f32>], params: &TsneParams) -> Array2<f64> {
    let n = vectors.len();
    let dim = vectors.first().map_or(0, Vec::len);
    let x = Array2::from_shape_fn((n, dim), |(i, j)| f64::from(vectors[i][j]));

    let distances = squared_distances(&x);
    let conditional = conditional_probabilities(&distances, params.perplexity);
    let p = joint_probabilities(&conditional);

    let mut y = initial_layout(n, params.seed);
    optimize(&mut y, &p, params);

    if let Some(mean) = y.mean_axis(Axis(0)) {
        y -= &mean;
    }
    y
}

/// Pairwise squared Euclidean distances.
pub fn squared_distances(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let gram = x.dot(&x.t());
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            (gram[[i, i]] + gram[[j, j]] - 2.0 * gram[[i, j]]).max(0.0)
        }
    })
}

/// Row-wise Gaussian affinities whose entropy matches `ln(perplexity)`.
///
/// Each row's precision is found by bisection. Rows sum to one and the
/// diagonal is zero.
pub fn conditional_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let desired_entropy = perplexity.max(1.0).ln();
    let mut conditional = Array2::<f64>::zeros((n, n));
    let mut probs = vec![0.0f64; n];

    for i in 0..n {
        let row = distances.row(i);
        // Shift by the nearest neighbor's distance so exp() cannot underflow to all zeros.
        let nearest = (0..n)
            .filter(|&j| j != i)
            .map(|j| row[j])
            .fold(f64::INFINITY, f64::min);
        let nearest = if nearest.is_finite() { nearest } else { 0.0 };

        let mut beta = 1.0f64;
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;

        for _ in 0..PERPLEXITY_STEPS {
            let mut sum = 0.0;
            for j in 0..n {
                probs[j] = if j == i {
                    0.0
                } else {
                    (-(row[j] - nearest) * beta).exp()
                };
                sum += probs[j];
            }
            let sum = sum.max(EPSILON);

            let mut weighted = 0.0;
            for j in 0..n {
                probs[j] /= sum;
                weighted += (row[j] - nearest) * probs[j];
            }

            let entropy = sum.ln() + beta * weighted;
            let diff = entropy - desired_entropy;
            if diff.abs() <= PERPLEXITY_TOL {
                break;
            }

            if diff > 0.0 {
                beta_min = beta;
                beta = if beta_max.is_infinite() {
                    beta * 2.0
                } else {
                    (beta + beta_max) / 2.0
                };
            } else {
                beta_max = beta;
                beta = if beta_min.is_infinite() {
                    beta / 2.0
                } else {
                    (beta + beta_min) / 2.0
                };
            }
        }

        for j in 0..n {
            conditional[[i, j]] = probs[j];
        }
    }

    conditional
}

/// Symmetrise conditional affinities into joint probabilities summing to one.
pub fn joint_probabilities(conditional: &Array2<f64>) -> Array2<f64> {
    let mut p = conditional + &conditional.t();
    let total = p.sum().max(EPSILON);
    p.mapv_inplace(|v| (v / total).max(EPSILON));
    for i in 0..p.nrows() {
        p[[i, i]] = 0.0;
    }
    p
}

/// Seeded N(0, INIT_STD²) starting layout.
fn initial_layout(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = fastrand::Rng::with_seed(seed);
    Array2::from_shape_simple_fn((n, 2), || standard_normal(&mut rng) * INIT_STD)
}

/// Box-Muller transform.
fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn optimize(y: &mut Array2<f64>, p: &Array2<f64>, params: &TsneParams) {
    let n = y.nrows();
    let learning_rate = params
        .learning_rate
        .unwrap_or_else(|| (n as f64 / params.early_exaggeration / 4.0).max(50.0));
    let exaggerated = p * params.early_exaggeration;

    let mut update = Array2::<f64>::zeros((n, 2));
    let mut gains = Array2::<f64>::ones((n, 2));

    for iter in 0..params.max_iter {
        let (target, momentum) = if iter < EXAGGERATION_ITERS {
            (&exaggerated, INITIAL_MOMENTUM)
        } else {
            (p, FINAL_MOMENTUM)
        };

        let grad = gradient(y, target);
        for ((u, gain), g) in update.iter_mut().zip(gains.iter_mut()).zip(grad.iter()) {
            if *u * *g < 0.0 {
                *gain += 0.2;
            } else {
                *gain *= 0.8;
            }
            *gain = gain.max(MIN_GAIN);
            *u = momentum * *u - learning_rate * *gain * *g;
        }
        *y += &update;
    }
}

/// Gradient of KL(P || Q) with Student-t affinities in the embedding.
fn gradient(y: &Array2<f64>, p: &Array2<f64>) -> Array2<f64> {
    let n = y.nrows();
    let mut num = Array2::<f64>::zeros((n, n));
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = y[[i, 0]] - y[[j, 0]];
            let dy = y[[i, 1]] - y[[j, 1]];
            let q = 1.0 / (1.0 + dx * dx + dy * dy);
            num[[i, j]] = q;
            num[[j, i]] = q;
            sum += 2.0 * q;
        }
    }
    let sum = sum.max(EPSILON);

    let mut grad = Array2::<f64>::zeros((n, 2));
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (num[[i, j]] / sum).max(EPSILON);
            let mult = (p[[i, j]] - q) * num[[i, j]];
            grad[[i, 0]] += mult * (y[[i, 0]] - y[[j, 0]]);
            grad[[i, 1]] += mult * (y[[i, 1]] - y[[j, 1]]);
        }
    }
    grad * 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(perplexity: f64) -> TsneParams {
        TsneParams {
            perplexity,
            seed: 42,
            max_iter: 1000,
            learning_rate: None,
            early_exaggeration: 12.0,
        }
    }

    /// Two well-separated groups of 6 points in 8 dimensions.
    fn two_clusters() -> Vec<Vec<f32>> {
        (0..12)
            .map(|i| {
                let mut v = vec![0.0f32; 8];
                v[if i < 6 { 0 } else { 4 }] = 10.0;
                v[1 + i % 3] += 0.1 * (i as f32 % 5.0);
                v[5 + i % 2] += 0.05 * i as f32;
                v
            })
            .collect()
    }

    fn dist(y: &Array2<f64>, a: usize, b: usize) -> f64 {
        ((y[[a, 0]] - y[[b, 0]]).powi(2) + (y[[a, 1]] - y[[b, 1]]).powi(2)).sqrt()
    }

    #[test]
    fn squared_distances_are_symmetric_with_zero_diagonal() {
        let x = Array2::from_shape_vec((3, 2), vec![0.0, 0.0, 3.0, 4.0, 0.0, 1.0]).unwrap();
        let d = squared_distances(&x);
        assert!((d[[0, 1]] - 25.0).abs() < 1e-9);
        assert!((d[[1, 0]] - 25.0).abs() < 1e-9);
        assert!((d[[0, 2]] - 1.0).abs() < 1e-9);
        assert_eq!(d[[1, 1]], 0.0);
    }

    #[test]
    fn conditional_rows_sum_to_one_and_hit_perplexity() {
        let vectors = two_clusters();
        let x = Array2::from_shape_fn((12, 8), |(i, j)| f64::from(vectors[i][j]));
        let perplexity = 5.0;
        let c = conditional_probabilities(&squared_distances(&x), perplexity);
        for i in 0..12 {
            let row = c.row(i);
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert_eq!(row[i], 0.0);
            let entropy: f64 = row.iter().filter(|&&p| p > 0.0).map(|&p| -p * p.ln()).sum();
            assert!((entropy.exp() - perplexity).abs() < 1e-2, "row {i}: {}", entropy.exp());
        }
    }

    #[test]
    fn joint_probabilities_sum_to_one() {
        let c = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let p = joint_probabilities(&c);
        assert!((p.sum() - 1.0).abs() < 1e-9);
        assert!((p[[0, 1]] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_layout() {
        let vectors = two_clusters();
        let a = fit_transform(&vectors, &params(5.0));
        let b = fit_transform(&vectors, &params(5.0));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_changes_layout() {
        let vectors = two_clusters();
        let a = fit_transform(&vectors, &params(5.0));
        let mut other = params(5.0);
        other.seed = 7;
        let b = fit_transform(&vectors, &other);
        assert_ne!(a, b);
    }

    #[test]
    fn clusters_stay_apart() {
        let y = fit_transform(&two_clusters(), &params(5.0));
        let mut intra = 0.0f64;
        let mut inter = f64::INFINITY;
        for a in 0..12 {
            for b in (a + 1)..12 {
                let d = dist(&y, a, b);
                if (a < 6) == (b < 6) {
                    intra = intra.max(d);
                } else {
                    inter = inter.min(d);
                }
            }
        }
        assert!(inter > intra, "closest cross-cluster pair {inter} vs widest cluster {intra}");
    }

    #[test]
    fn output_is_centred() {
        let y = fit_transform(&two_clusters(), &params(5.0));
        let mean = y.mean_axis(Axis(0)).unwrap();
        assert!(mean[0].abs() < 1e-9 && mean[1].abs() < 1e-9);
    }
}
