//! Principal component analysis via power iteration.
//!
//! Matrix-free: the covariance-vector product is accumulated directly
//! from the centered rows, so no d*d matrix is ever materialized.
//! Accumulation happens in f64; the start vector comes from a seeded RNG
//! and the component sign is canonicalized, so identical input always
//! produces identical output.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const POWER_ITERATIONS: usize = 200;
const CONVERGENCE_EPS: f64 = 1e-10;

/// Project rows of `data` onto their top-2 principal directions.
///
/// Expects at least 2 rows of equal length.
pub fn reduce(data: &[Vec<f32>], seed: u64) -> Vec<[f32; 2]> {
    let n = data.len();
    let dims = data[0].len();

    // Mean-center in f64
    let mut mean = vec![0.0f64; dims];
    for row in data {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    let centered: Vec<Vec<f64>> = data
        .iter()
        .map(|row| {
            row.iter()
                .zip(&mean)
                .map(|(&v, &m)| v as f64 - m)
                .collect()
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let first = principal_direction(&centered, None, &mut rng);
    let second = principal_direction(&centered, Some(&first), &mut rng);

    centered
        .iter()
        .map(|row| [dot(row, &first) as f32, dot(row, &second) as f32])
        .collect()
}

/// Power iteration for the dominant eigenvector of the covariance of
/// `rows`, deflating against `orthogonal_to` when given.
fn principal_direction(
    rows: &[Vec<f64>],
    orthogonal_to: Option<&[f64]>,
    rng: &mut StdRng,
) -> Vec<f64> {
    let dims = rows[0].len();

    let mut v: Vec<f64> = (0..dims).map(|_| rng.random::<f64>() - 0.5).collect();
    if let Some(prev) = orthogonal_to {
        deflate(&mut v, prev);
    }
    normalize(&mut v);

    for _ in 0..POWER_ITERATIONS {
        // next = Cov * v, accumulated row by row: sum_i rows[i] * (rows[i] . v)
        let mut next = vec![0.0f64; dims];
        for row in rows {
            let coeff = dot(row, &v);
            for (acc, &value) in next.iter_mut().zip(row) {
                *acc += coeff * value;
            }
        }

        if let Some(prev) = orthogonal_to {
            deflate(&mut next, prev);
        }

        let norm = normalize(&mut next);
        if norm < CONVERGENCE_EPS {
            // Degenerate direction (no variance left); keep the previous
            // unit vector so output stays deterministic and finite
            return v;
        }

        let delta: f64 = v
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        v = next;

        if delta < CONVERGENCE_EPS {
            break;
        }
    }

    canonicalize_sign(&mut v);
    v
}

/// Remove the component of `v` along the unit vector `axis`.
fn deflate(v: &mut [f64], axis: &[f64]) {
    let coeff = dot(v, axis);
    for (value, &a) in v.iter_mut().zip(axis) {
        *value -= coeff * a;
    }
}

/// Flip `v` so its largest-magnitude component is positive. Eigenvectors
/// are only defined up to sign; fixing it keeps output reproducible.
fn canonicalize_sign(v: &mut [f64]) {
    let dominant = v
        .iter()
        .fold(0.0f64, |acc, &x| if x.abs() > acc.abs() { x } else { acc });
    if dominant < 0.0 {
        for value in v.iter_mut() {
            *value = -*value;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for value in v.iter_mut() {
            *value /= norm;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let data = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 10.0],
            vec![-1.0, 0.5, 2.0],
        ];

        let first = reduce(&data, 42);
        let second = reduce(&data, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_coordinates_finite() {
        let data = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];

        for point in reduce(&data, 42) {
            assert!(point[0].is_finite());
            assert!(point[1].is_finite());
        }
    }

    #[test]
    fn test_returns_one_point_per_row() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(reduce(&data, 42).len(), 3);
    }

    #[test]
    fn test_first_axis_captures_dominant_variance() {
        // Points spread along one direction with tiny orthogonal noise:
        // x must carry far more spread than y
        let data: Vec<Vec<f32>> = (0..10)
            .map(|i| vec![i as f32, 0.001 * (i % 2) as f32, 0.0])
            .collect();

        let reduced = reduce(&data, 42);

        let spread = |axis: usize| {
            let values: Vec<f32> = reduced.iter().map(|p| p[axis]).collect();
            let max = values.iter().cloned().fold(f32::MIN, f32::max);
            let min = values.iter().cloned().fold(f32::MAX, f32::min);
            max - min
        };

        assert!(spread(0) > 8.0);
        assert!(spread(1) < 0.1);
    }

    #[test]
    fn test_two_identical_points() {
        // Zero variance everywhere: projection collapses to the origin
        let data = vec![vec![1.0, 1.0], vec![1.0, 1.0]];

        for point in reduce(&data, 42) {
            assert!(point[0].abs() < 1e-6);
            assert!(point[1].abs() < 1e-6);
        }
    }
}
