//! Exact t-SNE for small point sets.
//!
//! Straight implementation of the original Barnes-Hut-free algorithm:
//! pairwise affinities with per-point precision found by binary search
//! against a target perplexity, then gradient descent on the 2D layout
//! with early exaggeration and a momentum schedule. Point counts are
//! capped upstream, so the quadratic cost stays bounded. Initialization
//! comes from a seeded RNG; identical seed and input give identical
//! output.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Early exaggeration factor applied to affinities
const EXAGGERATION: f64 = 12.0;
/// Iterations during which exaggeration and low momentum apply
const EXAGGERATION_ITERS: usize = 250;
const MOMENTUM_INITIAL: f64 = 0.5;
const MOMENTUM_FINAL: f64 = 0.8;
const LEARNING_RATE: f64 = 200.0;
/// Binary search steps for per-point precision
const PRECISION_SEARCH_STEPS: usize = 50;

/// Embed rows of `data` into 2D.
///
/// Expects at least 2 rows of equal length. The effective perplexity is
/// clamped to `[1, (n-1)/3]` so tiny inputs stay well-defined.
pub fn reduce(data: &[Vec<f32>], perplexity: f32, iters: usize, seed: u64) -> Vec<[f32; 2]> {
    let n = data.len();

    let perplexity = (perplexity as f64).min((n - 1) as f64 / 3.0).max(1.0);
    let p = joint_affinities(data, perplexity);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut y: Vec<[f64; 2]> = (0..n)
        .map(|_| {
            [
                (rng.random::<f64>() - 0.5) * 1e-4,
                (rng.random::<f64>() - 0.5) * 1e-4,
            ]
        })
        .collect();

    let mut velocity = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];

    for iter in 0..iters {
        let exaggeration = if iter < EXAGGERATION_ITERS {
            EXAGGERATION
        } else {
            1.0
        };
        let momentum = if iter < EXAGGERATION_ITERS {
            MOMENTUM_INITIAL
        } else {
            MOMENTUM_FINAL
        };

        // Student-t kernel over the current layout
        let mut q_num = vec![0.0f64; n * n];
        let mut q_sum = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let num = 1.0 / (1.0 + dx * dx + dy * dy);
                q_num[i * n + j] = num;
                q_num[j * n + i] = num;
                q_sum += 2.0 * num;
            }
        }
        let q_sum = q_sum.max(f64::MIN_POSITIVE);

        let gradients: Vec<[f64; 2]> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut grad = [0.0f64; 2];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let num = q_num[i * n + j];
                    let q = (num / q_sum).max(f64::MIN_POSITIVE);
                    let coeff = 4.0 * (exaggeration * p[i * n + j] - q) * num;
                    grad[0] += coeff * (y[i][0] - y[j][0]);
                    grad[1] += coeff * (y[i][1] - y[j][1]);
                }
                grad
            })
            .collect();

        for i in 0..n {
            for axis in 0..2 {
                // Adaptive gains, standard t-SNE update rule
                let same_direction = gradients[i][axis].signum() == velocity[i][axis].signum();
                gains[i][axis] = if same_direction {
                    (gains[i][axis] * 0.8).max(0.01)
                } else {
                    gains[i][axis] + 0.2
                };

                velocity[i][axis] = momentum * velocity[i][axis]
                    - LEARNING_RATE * gains[i][axis] * gradients[i][axis];
                y[i][axis] += velocity[i][axis];
            }
        }

        // Keep the layout centered
        let center = y.iter().fold([0.0f64; 2], |acc, point| {
            [acc[0] + point[0] / n as f64, acc[1] + point[1] / n as f64]
        });
        for point in y.iter_mut() {
            point[0] -= center[0];
            point[1] -= center[1];
        }
    }

    y.iter()
        .map(|point| [point[0] as f32, point[1] as f32])
        .collect()
}

/// Symmetrized joint affinities P with per-point precisions matched to
/// the target perplexity by binary search.
fn joint_affinities(data: &[Vec<f32>], perplexity: f64) -> Vec<f64> {
    let n = data.len();
    let distances = pairwise_squared_distances(data);
    let target_entropy = perplexity.ln();

    let conditional: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut beta = 1.0f64;
            let mut beta_min = f64::NEG_INFINITY;
            let mut beta_max = f64::INFINITY;
            let mut row = vec![0.0f64; n];

            for _ in 0..PRECISION_SEARCH_STEPS {
                let (entropy, probabilities) = row_entropy(&distances, i, n, beta);
                row = probabilities;

                let diff = entropy - target_entropy;
                if diff.abs() < 1e-5 {
                    break;
                }

                if diff > 0.0 {
                    beta_min = beta;
                    beta = if beta_max.is_finite() {
                        (beta + beta_max) / 2.0
                    } else {
                        beta * 2.0
                    };
                } else {
                    beta_max = beta;
                    beta = if beta_min.is_finite() {
                        (beta + beta_min) / 2.0
                    } else {
                        beta / 2.0
                    };
                }
            }

            row
        })
        .collect();

    // Symmetrize and floor so every pair keeps a little attraction
    let mut p = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let value = (conditional[i][j] + conditional[j][i]) / (2.0 * n as f64);
            p[i * n + j] = value.max(1e-12);
        }
    }
    p
}

/// Shannon entropy and probabilities of row `i` under precision `beta`.
fn row_entropy(distances: &[f64], i: usize, n: usize, beta: f64) -> (f64, Vec<f64>) {
    let mut probabilities = vec![0.0f64; n];
    let mut sum = 0.0f64;
    for j in 0..n {
        if j == i {
            continue;
        }
        let value = (-distances[i * n + j] * beta).exp();
        probabilities[j] = value;
        sum += value;
    }

    if sum <= 0.0 {
        // All mass collapsed; fall back to uniform over the other points
        let uniform = 1.0 / (n - 1) as f64;
        for (j, probability) in probabilities.iter_mut().enumerate() {
            *probability = if j == i { 0.0 } else { uniform };
        }
        return (((n - 1) as f64).ln().max(0.0), probabilities);
    }

    let mut entropy = 0.0f64;
    for (j, probability) in probabilities.iter_mut().enumerate() {
        if j == i {
            continue;
        }
        *probability /= sum;
        if *probability > 0.0 {
            entropy -= *probability * probability.ln();
        }
    }

    (entropy, probabilities)
}

fn pairwise_squared_distances(data: &[Vec<f32>]) -> Vec<f64> {
    let n = data.len();
    let mut distances = vec![0.0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let distance: f64 = data[i]
                .iter()
                .zip(&data[j])
                .map(|(&a, &b)| {
                    let diff = a as f64 - b as f64;
                    diff * diff
                })
                .sum();
            distances[i * n + j] = distance;
            distances[j * n + i] = distance;
        }
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0, 0.1],
            vec![0.1, 0.0, 0.0],
            vec![0.0, 0.1, 0.0],
            vec![10.0, 10.0, 10.1],
            vec![10.1, 10.0, 10.0],
            vec![10.0, 10.1, 10.0],
        ]
    }

    #[test]
    fn test_deterministic_with_fixed_seed() {
        let data = two_clusters();

        let first = reduce(&data, 30.0, 300, 42);
        let second = reduce(&data, 30.0, 300, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_coordinates_finite() {
        let data = two_clusters();

        for point in reduce(&data, 30.0, 500, 42) {
            assert!(point[0].is_finite());
            assert!(point[1].is_finite());
        }
    }

    #[test]
    fn test_returns_one_point_per_row() {
        let data = two_clusters();
        assert_eq!(reduce(&data, 30.0, 100, 42).len(), 6);
    }

    #[test]
    fn test_minimum_input_of_two_points() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];

        let reduced = reduce(&data, 30.0, 100, 42);
        assert_eq!(reduced.len(), 2);
        for point in &reduced {
            assert!(point[0].is_finite() && point[1].is_finite());
        }
    }

    #[test]
    fn test_clusters_stay_separated() {
        let data = two_clusters();
        let reduced = reduce(&data, 5.0, 500, 42);

        let dist = |a: &[f32; 2], b: &[f32; 2]| {
            ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
        };

        // Every point's nearest neighbor must come from its own cluster
        for i in 0..6 {
            let mut best = (usize::MAX, f32::MAX);
            for j in 0..6 {
                if i == j {
                    continue;
                }
                let d = dist(&reduced[i], &reduced[j]);
                if d < best.1 {
                    best = (j, d);
                }
            }
            assert_eq!(best.0 / 3, i / 3, "point {} paired across clusters", i);
        }
    }
}
