//! Synthetic-data helpers for tests and examples.
//!
//! Linear sampling of an input range, Gaussian noise injection, and model
//! evaluation over an array. Deterministic under a seeded RNG; the core
//! estimator never uses this module.

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::Result;
use crate::expr::Expr;

/// `n` evenly spaced values over `[start, stop]` (inclusive).
pub fn linspace(start: f64, stop: f64, n: usize) -> Array1<f64> {
    Array1::linspace(start, stop, n)
}

/// Add independent Gaussian noise of standard deviation `std` to each value.
///
/// A `std` of zero returns the input unchanged.
pub fn gaussian_noise<R: Rng>(values: &Array1<f64>, std: f64, rng: &mut R) -> Array1<f64> {
    assert!(std >= 0.0, "noise std must be non-negative");
    if std == 0.0 {
        return values.clone();
    }
    let normal = Normal::new(0.0, std).expect("std is finite and non-negative");
    values.mapv(|v| v + normal.sample(rng))
}

/// Evaluate `model` (with all parameters already substituted) over `xs` and
/// perturb each value with Gaussian noise of standard deviation `noise_std`.
pub fn sample_model<R: Rng>(
    model: &Expr,
    var: &str,
    xs: &Array1<f64>,
    noise_std: f64,
    rng: &mut R,
) -> Result<Array1<f64>> {
    let f = model.lambdify1(var)?;
    let exact = xs.mapv(f);
    Ok(gaussian_noise(&exact, noise_std, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_linspace_endpoints() {
        let xs = linspace(1.0, 20.0, 20);
        assert_eq!(xs.len(), 20);
        assert_relative_eq!(xs[0], 1.0);
        assert_relative_eq!(xs[19], 20.0);
        assert_relative_eq!(xs[1] - xs[0], 1.0);
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let xs = linspace(0.0, 1.0, 5);
        assert_eq!(gaussian_noise(&xs, 0.0, &mut rng), xs);
    }

    #[test]
    fn test_noise_is_deterministic_under_seed() {
        let xs = linspace(0.0, 1.0, 8);
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            gaussian_noise(&xs, 0.5, &mut rng_a),
            gaussian_noise(&xs, 0.5, &mut rng_b)
        );
    }

    #[test]
    fn test_sample_model() {
        let model = Expr::parse("k*x").unwrap().substitute_value("k", 2.0);
        let xs = linspace(1.0, 3.0, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let ys = sample_model(&model, "x", &xs, 0.0, &mut rng).unwrap();
        assert_relative_eq!(ys[0], 2.0);
        assert_relative_eq!(ys[2], 6.0);
    }
}
