//! Guerrero's method for choosing the Box-Cox parameter.
//!
//! The series is cut into contiguous subseries of one seasonal cycle. For
//! the right lambda the ratio of each subseries' standard deviation to its
//! mean raised to `1 - lambda` is constant, so the coefficient of variation
//! of those ratios is minimised over lambda.

use super::boxcox::check_positive;
use crate::error::{ForecastError, Result};
use crate::utils::optimization::brent_minimize;

/// Subseries length used for non-seasonal data.
pub const NONSEASONAL_LENGTH: usize = 2;

/// Estimate lambda on `[lower, upper]` using subseries of length
/// `max(2, period)` taken from the end of the series.
pub fn guerrero_lambda(series: &[f64], period: usize, lower: f64, upper: f64) -> Result<f64> {
    check_positive(series)?;

    let groups = subseries_moments(series, period)?;
    if groups.iter().all(|&(_, sd)| sd == 0.0) {
        return Err(ForecastError::ComputationError(
            "subseries have no variation; lambda is not identifiable".to_string(),
        ));
    }

    let result = brent_minimize(|lambda| ratio_cv(&groups, lambda), lower, upper, 1e-8, 200);
    tracing::debug!(
        lambda = result.x,
        cv = result.value,
        iterations = result.iterations,
        "guerrero lambda estimated"
    );
    Ok(result.x)
}

/// Mean and sample standard deviation of each complete subseries.
fn subseries_moments(series: &[f64], period: usize) -> Result<Vec<(f64, f64)>> {
    let width = period.max(NONSEASONAL_LENGTH);
    let cycles = series.len() / width;
    if cycles < 2 {
        return Err(ForecastError::InsufficientData {
            needed: 2 * width,
            got: series.len(),
        });
    }

    let start = series.len() - cycles * width;
    Ok(series[start..]
        .chunks_exact(width)
        .map(|chunk| {
            let mean = chunk.iter().sum::<f64>() / width as f64;
            let var = chunk.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (width - 1) as f64;
            (mean, var.sqrt())
        })
        .collect())
}

fn ratio_cv(groups: &[(f64, f64)], lambda: f64) -> f64 {
    let ratios: Vec<f64> = groups
        .iter()
        .map(|&(mean, sd)| sd / mean.powf(1.0 - lambda))
        .collect();
    let k = ratios.len() as f64;
    let mean = ratios.iter().sum::<f64>() / k;
    let sd = (ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (k - 1.0)).sqrt();
    sd / mean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growing_amplitude(n: usize) -> Vec<f64> {
        let pattern = [1.0, -1.0, 0.5, -0.5];
        (0..n)
            .map(|t| {
                let level = 10.0 * (0.06 * t as f64).exp();
                level + 0.05 * level.powf(1.5) * pattern[t % 4]
            })
            .collect()
    }

    #[test]
    fn guerrero_detects_power_relationship() {
        let lambda = guerrero_lambda(&growing_amplitude(40), 4, -1.0, 2.0).unwrap();
        assert!(lambda > -1.0 && lambda < 0.0, "lambda = {}", lambda);
    }

    #[test]
    fn guerrero_near_one_for_constant_amplitude() {
        let pattern = [2.0, -2.0, 1.0, -1.0];
        let series: Vec<f64> = (0..40).map(|t| 50.0 + t as f64 + pattern[t % 4]).collect();
        let lambda = guerrero_lambda(&series, 4, -1.0, 2.0).unwrap();
        assert!(lambda > 0.5, "lambda = {}", lambda);
    }

    #[test]
    fn guerrero_rejects_non_positive_data() {
        let mut series = growing_amplitude(40);
        series[3] = 0.0;
        assert!(matches!(
            guerrero_lambda(&series, 4, -1.0, 2.0),
            Err(ForecastError::Domain(_))
        ));
    }

    #[test]
    fn guerrero_needs_two_subseries() {
        let series = growing_amplitude(7);
        assert!(matches!(
            guerrero_lambda(&series, 4, -1.0, 2.0),
            Err(ForecastError::InsufficientData { needed: 8, got: 7 })
        ));
    }

    #[test]
    fn guerrero_uses_pairs_for_annual_data() {
        let series: Vec<f64> = (0..6).map(|t| 10.0 + t as f64 + (t % 2) as f64).collect();
        let lambda = guerrero_lambda(&series, 1, -1.0, 2.0).unwrap();
        assert!((-1.0..=2.0).contains(&lambda));
    }
}
