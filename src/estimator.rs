//! Local error estimate of the Heun–Euler pair
//!
//! The Euler predictor and the Heun corrector differ by
//! `dt/2 * (d2 - d1)`, so the difference between the two derivative
//! evaluations scaled by the step is a first-order estimate of the local
//! truncation error of the Euler solution.

use serde::Deserialize;

use crate::error::IntegrationError;

/// Norm used to reduce the derivative difference to a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorNorm {
    /// Maximum absolute difference over all elements
    #[default]
    MaxAbs,
    /// The state is a field of `components`-vectors stored contiguously.
    /// Maximum Euclidean length of the per-vector difference.
    MaxVector {
        /// Number of components per vector (3 for a magnetization field)
        components: usize,
    },
}

impl ErrorNorm {
    /// Check that a state of length `len` can be reduced with this norm
    pub fn validate(&self, len: usize) -> Result<(), IntegrationError> {
        match *self {
            ErrorNorm::MaxAbs => Ok(()),
            ErrorNorm::MaxVector { components: 0 } => Err(IntegrationError::invalid_config(
                "vector norm needs at least one component",
            )),
            ErrorNorm::MaxVector { components } if len % components != 0 => {
                Err(IntegrationError::invalid_config(format!(
                    "state length {} is not a multiple of {} components",
                    len, components
                )))
            }
            ErrorNorm::MaxVector { .. } => Ok(()),
        }
    }

    /// Maximum difference between `d1` and `d2` under this norm
    pub fn max_diff(&self, d1: &[f64], d2: &[f64]) -> f64 {
        debug_assert_eq!(d1.len(), d2.len());
        match *self {
            ErrorNorm::MaxAbs => d1
                .iter()
                .zip(d2)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, fmax),
            ErrorNorm::MaxVector { components } => d1
                .chunks_exact(components)
                .zip(d2.chunks_exact(components))
                .map(|(a, b)| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| (x - y) * (x - y))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(0.0, fmax),
        }
    }
}

// f64::max drops NaN operands; the estimate has to keep them.
fn fmax(acc: f64, x: f64) -> f64 {
    if x.is_nan() || x > acc {
        x
    } else {
        acc
    }
}

/// Estimate the local error of a step of internal size `dt` from the stage-1
/// derivative `d1` and the stage-2 derivative `d2`.
///
/// Fails with [`IntegrationError::NonFiniteError`] when the estimate is NaN
/// or infinite; `t` is only used to annotate the error.
pub fn estimate(
    norm: ErrorNorm,
    d1: &[f64],
    d2: &[f64],
    dt: f64,
    t: f64,
) -> Result<f64, IntegrationError> {
    let error = norm.max_diff(d1, d2) * dt;
    if !error.is_finite() {
        return Err(IntegrationError::NonFiniteError { t, error });
    }
    Ok(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_max_abs_scaled_by_step() {
        let d1 = [1.0, -2.0, 0.5];
        let d2 = [1.5, -2.0, -0.5];
        let err = estimate(ErrorNorm::MaxAbs, &d1, &d2, 0.1, 0.0).unwrap();
        assert_relative_eq!(err, 0.1, epsilon = 1e-15);
    }

    #[test]
    fn test_identical_derivatives_give_zero() {
        let d = [3.0; 12];
        let err = estimate(ErrorNorm::MaxAbs, &d, &d, 1.0, 0.0).unwrap();
        assert_eq!(err, 0.0);
    }

    #[test]
    fn test_vector_norm() {
        // second vector differs by (3, 4, 0): length 5
        let d1 = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let d2 = [0.1, 0.0, 0.0, 4.0, 5.0, 1.0];
        let norm = ErrorNorm::MaxVector { components: 3 };
        let err = estimate(norm, &d1, &d2, 2.0, 0.0).unwrap();
        assert_relative_eq!(err, 10.0, epsilon = 1e-12);

        // same data under max-abs only sees the largest component
        let err = estimate(ErrorNorm::MaxAbs, &d1, &d2, 2.0, 0.0).unwrap();
        assert_relative_eq!(err, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_is_fatal() {
        let d1 = [0.0, 1.0];
        let d2 = [f64::NAN, 1.0];
        let result = estimate(ErrorNorm::MaxAbs, &d1, &d2, 0.1, 2.5);
        assert!(matches!(
            result,
            Err(IntegrationError::NonFiniteError { t, .. }) if t == 2.5
        ));

        // NaN after a larger finite difference must still be reported
        let d1 = [0.0, 1.0];
        let d2 = [10.0, f64::NAN];
        assert!(estimate(ErrorNorm::MaxAbs, &d1, &d2, 0.1, 0.0).is_err());
    }

    #[test]
    fn test_infinity_is_fatal() {
        let d1 = [0.0, 0.0, 0.0];
        let d2 = [f64::INFINITY, 0.0, 0.0];
        let norm = ErrorNorm::MaxVector { components: 3 };
        assert!(estimate(norm, &d1, &d2, 0.1, 0.0).is_err());
    }

    #[test]
    fn test_validate_vector_shape() {
        assert!(ErrorNorm::MaxAbs.validate(7).is_ok());
        assert!(ErrorNorm::MaxVector { components: 3 }.validate(9).is_ok());
        assert!(ErrorNorm::MaxVector { components: 3 }.validate(10).is_err());
        assert!(ErrorNorm::MaxVector { components: 0 }.validate(9).is_err());
    }
}
