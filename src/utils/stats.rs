//! Statistical utility functions.

use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile function of the standard normal distribution.
///
/// # Example
/// ```
/// use forecast_pipeline::utils::quantile_normal;
///
/// // 95% confidence level -> z ≈ 1.96
/// let z = quantile_normal(0.975);
/// assert!((z - 1.959964).abs() < 1e-5);
/// ```
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Two-sided critical value for a central interval at `level`.
pub fn interval_z(level: f64) -> f64 {
    quantile_normal((1.0 + level) / 2.0)
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Mean of squared values, ignoring non-finite entries.
pub fn mean_square_finite(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = finite_values(values);
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().map(|v| v * v).sum::<f64>() / finite.len() as f64)
}

/// Copy of `values` without NaN or infinite entries.
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_normal_known_values() {
        assert_relative_eq!(quantile_normal(0.5), 0.0, epsilon = 1e-12);
        assert_relative_eq!(quantile_normal(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.025), -1.959964, epsilon = 1e-5);
        assert_relative_eq!(interval_z(0.8), 1.281552, epsilon = 1e-5);
        assert_eq!(quantile_normal(0.0), f64::NEG_INFINITY);
        assert_eq!(quantile_normal(1.0), f64::INFINITY);
    }

    #[test]
    fn mean_and_variance() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mean(&values), 2.5);
        assert_relative_eq!(variance(&values), 5.0 / 3.0);
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn finite_helpers_skip_nan() {
        let values = [f64::NAN, 2.0, f64::INFINITY, -2.0];
        assert_eq!(finite_values(&values), vec![2.0, -2.0]);
        assert_relative_eq!(mean_square_finite(&values).unwrap(), 4.0);
        assert!(mean_square_finite(&[f64::NAN]).is_none());
    }
}
