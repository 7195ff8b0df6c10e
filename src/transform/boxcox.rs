//! Box-Cox power transformation.
//!
//! Stabilises variance that grows with the level of a series.

use crate::error::{ForecastError, Result};

const LOG_THRESHOLD: f64 = 1e-10;

/// Check that every value lies in the Box-Cox domain (strictly positive).
pub fn check_positive(series: &[f64]) -> Result<()> {
    match series.iter().position(|&x| !(x > 0.0 && x.is_finite())) {
        None => Ok(()),
        Some(i) => Err(ForecastError::Domain(format!(
            "Box-Cox requires strictly positive values, found {} at position {}",
            series[i], i
        ))),
    }
}

/// Apply Box-Cox transformation with a given lambda.
///
/// For lambda != 0: y = (x^lambda - 1) / lambda
/// For lambda == 0: y = ln(x)
///
/// Fails with a domain error on any non-positive value; callers shift the
/// data beforehand if needed.
pub fn boxcox(series: &[f64], lambda: f64) -> Result<Vec<f64>> {
    check_positive(series)?;
    Ok(series.iter().map(|&x| boxcox_value(x, lambda)).collect())
}

#[inline]
fn boxcox_value(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < LOG_THRESHOLD {
        x.ln()
    } else {
        (lambda * x.ln()).exp_m1() / lambda
    }
}

/// Inverse of a single transformed value.
///
/// Where `lambda * y + 1 <= 0` the value has left the image of the transform
/// and is clipped to the edge of the support: 0 for positive lambda, +inf
/// for negative lambda.
#[inline]
pub fn inv_boxcox_value(y: f64, lambda: f64) -> f64 {
    if lambda.abs() < LOG_THRESHOLD {
        return y.exp();
    }
    if lambda * y + 1.0 <= 0.0 {
        if lambda > 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((lambda * y).ln_1p() / lambda).exp()
    }
}

/// Inverse Box-Cox transformation.
///
/// For lambda != 0: x = (lambda * y + 1)^(1/lambda)
/// For lambda == 0: x = exp(y)
pub fn inv_boxcox(transformed: &[f64], lambda: f64) -> Vec<f64> {
    transformed
        .iter()
        .map(|&y| inv_boxcox_value(y, lambda))
        .collect()
}

/// Find lambda by maximising the Box-Cox profile log-likelihood over
/// `[lower, upper]`, with a coarse grid followed by a finer local grid.
pub fn boxcox_lambda_loglik(series: &[f64], lower: f64, upper: f64) -> Result<f64> {
    check_positive(series)?;
    if series.len() < 2 {
        return Err(ForecastError::InsufficientData {
            needed: 2,
            got: series.len(),
        });
    }

    let log_sum: f64 = series.iter().map(|x| x.ln()).sum();
    let llf = |lambda: f64| boxcox_llf(series, log_sum, lambda);

    let coarse_steps = 300;
    let mut best_lambda = 1.0_f64.clamp(lower, upper);
    let mut best_llf = f64::NEG_INFINITY;
    for i in 0..=coarse_steps {
        let lambda = lower + (upper - lower) * i as f64 / coarse_steps as f64;
        let value = llf(lambda);
        if value > best_llf {
            best_llf = value;
            best_lambda = lambda;
        }
    }

    let width = (upper - lower) / coarse_steps as f64;
    let start = (best_lambda - width).max(lower);
    let end = (best_lambda + width).min(upper);
    for i in 0..=100 {
        let lambda = start + (end - start) * i as f64 / 100.0;
        let value = llf(lambda);
        if value > best_llf {
            best_llf = value;
            best_lambda = lambda;
        }
    }

    Ok(best_lambda)
}

/// Profile log-likelihood of normally distributed transformed data, up to
/// a constant.
fn boxcox_llf(series: &[f64], log_sum: f64, lambda: f64) -> f64 {
    let n = series.len() as f64;
    let transformed: Vec<f64> = series.iter().map(|&x| boxcox_value(x, lambda)).collect();
    if transformed.iter().any(|x| !x.is_finite()) {
        return f64::NEG_INFINITY;
    }

    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    if variance <= 0.0 {
        return f64::NEG_INFINITY;
    }

    -0.5 * n * variance.ln() + (lambda - 1.0) * log_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn boxcox_lambda_1() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = boxcox(&series, 1.0).unwrap();
        for (r, x) in result.iter().zip(&series) {
            assert_relative_eq!(*r, x - 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn boxcox_lambda_0_is_log() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = boxcox(&series, 0.0).unwrap();
        for (r, x) in result.iter().zip(&series) {
            assert_relative_eq!(*r, x.ln(), epsilon = 1e-10);
        }
    }

    #[test]
    fn boxcox_lambda_2() {
        let result = boxcox(&[1.0, 2.0, 3.0], 2.0).unwrap();
        assert_relative_eq!(result[0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(result[1], 1.5, epsilon = 1e-10);
        assert_relative_eq!(result[2], 4.0, epsilon = 1e-10);
    }

    #[test]
    fn boxcox_rejects_non_positive_values() {
        assert!(matches!(
            boxcox(&[1.0, 0.0, 2.0], 0.5),
            Err(ForecastError::Domain(_))
        ));
        assert!(matches!(
            boxcox(&[-1.0, 2.0], 0.0),
            Err(ForecastError::Domain(_))
        ));
    }

    #[test]
    fn boxcox_empty() {
        assert!(boxcox(&[], 1.0).unwrap().is_empty());
    }

    #[test]
    fn inv_boxcox_roundtrip_for_several_lambdas() {
        let series = vec![0.5, 1.0, 2.0, 30.0, 400.0];
        for lambda in [-1.0, -0.4, 0.0, 0.5, 1.0, 2.0] {
            let transformed = boxcox(&series, lambda).unwrap();
            let recovered = inv_boxcox(&transformed, lambda);
            for (orig, rec) in series.iter().zip(&recovered) {
                assert_relative_eq!(*orig, *rec, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn inv_boxcox_clips_outside_support() {
        // lambda * y + 1 <= 0
        assert_eq!(inv_boxcox_value(-3.0, 0.5), 0.0);
        assert_eq!(inv_boxcox_value(-2.0, 0.5), 0.0);
        assert_eq!(inv_boxcox_value(2.0, -0.5), f64::INFINITY);
        assert!(inv_boxcox_value(1.9, -0.5).is_finite());
    }

    #[test]
    fn loglik_lambda_near_zero_for_exponential_data() {
        let series: Vec<f64> = (1..=20).map(|i| (0.3 * i as f64).exp()).collect();
        let lambda = boxcox_lambda_loglik(&series, -1.0, 2.0).unwrap();
        assert!(lambda.abs() < 0.5, "expected lambda near 0, got {}", lambda);
    }

    #[test]
    fn loglik_lambda_within_bounds() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let lambda = boxcox_lambda_loglik(&series, -1.0, 2.0).unwrap();
        assert!((-1.0..=2.0).contains(&lambda));
    }

    #[test]
    fn loglik_lambda_requires_two_points() {
        assert!(matches!(
            boxcox_lambda_loglik(&[3.0], -1.0, 2.0),
            Err(ForecastError::InsufficientData { needed: 2, got: 1 })
        ));
    }
}
