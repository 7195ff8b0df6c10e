//! X-11 style decomposition with moving averages.
//!
//! Two passes: a centred 2 x period moving average gives a first trend, from
//! which seasonal factors are estimated per calendar position. The series is
//! then seasonally adjusted, a Henderson filter gives the final trend and the
//! seasonal factors are estimated again.

use super::{validate_input, Decomposer, Decomposition, DecompositionKind};
use crate::core::TimeSeries;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Minimum number of values per calendar position before the extremes are
/// dropped from the seasonal average.
const TRIM_MIN_VALUES: usize = 5;

/// X-11 settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct X11Config {
    /// Henderson filter length; `None` uses 13 for monthly data and 5
    /// otherwise.
    pub henderson_length: Option<usize>,
}

impl X11Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_henderson_length(mut self, length: usize) -> Self {
        self.henderson_length = Some(length);
        self
    }

    fn henderson_length(&self, period: usize) -> usize {
        let length = self
            .henderson_length
            .unwrap_or(if period >= 12 { 13 } else { 5 });
        let length = length.max(3);
        if length % 2 == 0 {
            length + 1
        } else {
            length
        }
    }
}

impl Decomposer for X11Config {
    fn decompose(&self, series: &TimeSeries, kind: DecompositionKind) -> Result<Decomposition> {
        validate_input(series, kind)?;
        let y = series.values();
        let period = series.period();
        let h_len = self.henderson_length(period);

        if period <= 1 {
            let trend = henderson_smooth(y, h_len);
            let seasonal = vec![kind.identity(); y.len()];
            return Ok(Decomposition::from_components(series, trend, seasonal, kind, self.name()));
        }

        let (first_trend, first_half) = centred_moving_average(y, period);
        let first_seasonal = seasonal_factors(y, &first_trend, period, first_half, kind);

        let adjusted: Vec<f64> = y
            .iter()
            .zip(&first_seasonal)
            .map(|(&v, &s)| kind.remove(v, s))
            .collect();
        let trend = henderson_smooth(&adjusted, h_len);
        let h_half = h_len.min(largest_odd(y.len())) / 2;
        let seasonal = seasonal_factors(y, &trend, period, h_half, kind);

        Ok(Decomposition::from_components(series, trend, seasonal, kind, self.name()))
    }

    fn name(&self) -> &'static str {
        "x11"
    }
}

/// Symmetric Henderson filter weights of odd `length`.
pub fn henderson_weights(length: usize) -> Vec<f64> {
    let half = (length / 2) as f64;
    let m = half + 2.0;
    let denom = 8.0
        * m
        * (m * m - 1.0)
        * (4.0 * m * m - 1.0)
        * (4.0 * m * m - 9.0)
        * (4.0 * m * m - 25.0);

    (0..length)
        .map(|k| {
            let j = k as f64 - half;
            let j2 = j * j;
            315.0
                * ((m - 1.0).powi(2) - j2)
                * (m * m - j2)
                * ((m + 1.0).powi(2) - j2)
                * (3.0 * m * m - 16.0 - 11.0 * j2)
                / denom
        })
        .collect()
}

fn largest_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n.saturating_sub(1)
    } else {
        n
    }
}

/// Apply a Henderson filter, shortening it when the series is too short.
fn henderson_smooth(values: &[f64], length: usize) -> Vec<f64> {
    let length = length.min(largest_odd(values.len()));
    if length < 3 {
        return values.to_vec();
    }
    let weights = henderson_weights(length);
    let half = length / 2;
    let filtered = apply_filter(values, &weights);
    fill_ends(values, filtered, half)
}

/// Centred moving average spanning one period: 2 x p for even periods, a
/// simple p-term average for odd ones. Returns the trend and filter half
/// width.
fn centred_moving_average(values: &[f64], period: usize) -> (Vec<f64>, usize) {
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;
    let filtered = apply_filter(values, &weights);
    (fill_ends(values, filtered, half), half)
}

/// Symmetric filter over positions `[half, n - half)`; other positions are
/// left at zero.
fn apply_filter(values: &[f64], weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    let half = weights.len() / 2;
    let mut out = vec![0.0; n];
    if n < weights.len() {
        return out;
    }
    for (i, slot) in out.iter_mut().enumerate().take(n - half).skip(half) {
        *slot = values[i - half..=i + half]
            .iter()
            .zip(weights)
            .map(|(v, w)| v * w)
            .sum();
    }
    out
}

/// Replace the first and last `half` positions with the widest centred
/// simple average that fits.
fn fill_ends(values: &[f64], mut trend: Vec<f64>, half: usize) -> Vec<f64> {
    let n = values.len();
    for i in (0..n).filter(|&i| i < half || i + half >= n) {
        let radius = i.min(n - 1 - i);
        let window = &values[i - radius..=i + radius];
        trend[i] = window.iter().sum::<f64>() / window.len() as f64;
    }
    trend
}

/// Seasonal factors per calendar position, normalised to average to the
/// identity element, expanded to the series index.
fn seasonal_factors(
    values: &[f64],
    trend: &[f64],
    period: usize,
    half: usize,
    kind: DecompositionKind,
) -> Vec<f64> {
    let n = values.len();
    let si = |i: usize| kind.remove(values[i], trend[i]);

    let factors: Vec<f64> = (0..period)
        .map(|pos| {
            let interior: Vec<f64> = (pos..n)
                .step_by(period)
                .filter(|&i| i >= half && i + half < n)
                .map(si)
                .collect();
            if interior.is_empty() {
                let all: Vec<f64> = (pos..n).step_by(period).map(si).collect();
                trimmed_mean(all)
            } else {
                trimmed_mean(interior)
            }
        })
        .collect();

    let centre = factors.iter().sum::<f64>() / period as f64;
    let normalised: Vec<f64> = factors
        .iter()
        .map(|&f| kind.remove(f, centre))
        .collect();
    (0..n).map(|i| normalised[i % period]).collect()
}

/// Mean after dropping the largest and smallest value when there are enough
/// values.
fn trimmed_mean(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    if values.len() >= TRIM_MIN_VALUES {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        values.pop();
        values.remove(0);
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn quarterly(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap()
    }

    const PATTERN: [f64; 4] = [3.0, -1.0, -4.0, 2.0];

    #[test]
    fn henderson_weights_known_values() {
        let w = henderson_weights(5);
        assert_relative_eq!(w[0], -0.073, epsilon = 1e-3);
        assert_relative_eq!(w[1], 0.294, epsilon = 1e-3);
        assert_relative_eq!(w[2], 0.559, epsilon = 1e-3);
        assert_relative_eq!(w[0], w[4], epsilon = 1e-15);

        for length in [5, 7, 9, 13, 23] {
            let sum: f64 = henderson_weights(length).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(henderson_weights(13)[6], 0.2401, epsilon = 1e-4);
    }

    #[test]
    fn henderson_reproduces_cubics() {
        let values: Vec<f64> = (0..30)
            .map(|i| {
                let t = i as f64;
                1.0 + 0.5 * t - 0.02 * t * t + 0.001 * t * t * t
            })
            .collect();
        let smoothed = henderson_smooth(&values, 13);
        for i in 6..24 {
            assert_relative_eq!(smoothed[i], values[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn x11_recovers_additive_pattern() {
        let values: Vec<f64> = (0..40).map(|i| 10.0 + 0.5 * i as f64 + PATTERN[i % 4]).collect();
        let d = X11Config::default()
            .decompose(&quarterly(values), DecompositionKind::Additive)
            .unwrap();

        for i in 0..40 {
            assert_relative_eq!(d.seasonal[i], PATTERN[i % 4], epsilon = 1e-9);
            assert_relative_eq!(d.trend[i], 10.0 + 0.5 * i as f64, epsilon = 1e-9);
            assert!(d.remainder[i].abs() < 1e-9);
        }
    }

    #[test]
    fn x11_multiplicative_factors_average_to_one() {
        let factors = [1.2, 0.9, 0.8, 1.1];
        let values: Vec<f64> = (0..40)
            .map(|i| (100.0 + 2.0 * i as f64) * factors[i % 4])
            .collect();
        let d = X11Config::default()
            .decompose(&quarterly(values), DecompositionKind::Multiplicative)
            .unwrap();

        let mean: f64 = d.seasonal[..4].iter().sum::<f64>() / 4.0;
        assert_relative_eq!(mean, 1.0, epsilon = 1e-12);
        for i in 0..4 {
            assert_relative_eq!(d.seasonal[i], factors[i], epsilon = 0.02);
        }
    }

    #[test]
    fn x11_trimming_resists_isolated_outlier() {
        let mut values: Vec<f64> =
            (0..40).map(|i| 10.0 + 0.5 * i as f64 + PATTERN[i % 4]).collect();
        values[21] += 50.0;
        let d = X11Config::default()
            .decompose(&quarterly(values), DecompositionKind::Additive)
            .unwrap();

        for pos in 0..4 {
            assert!((d.seasonal[pos] - PATTERN[pos]).abs() < 1.0);
        }
        assert!(d.remainder[21] > 15.0);
    }

    #[test]
    fn trimmed_mean_drops_extremes() {
        assert_relative_eq!(trimmed_mean(vec![1.0, 2.0, 3.0, 4.0, 100.0]), 3.0);
        assert_relative_eq!(trimmed_mean(vec![1.0, 2.0, 100.0]), 103.0 / 3.0);
    }

    #[test]
    fn fill_ends_uses_centred_windows() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        let filled = fill_ends(&values, vec![0.0; 5], 2);
        assert_eq!(filled[0], 1.0);
        assert_relative_eq!(filled[1], 7.0 / 3.0);
        assert_eq!(filled[2], 0.0);
        assert_relative_eq!(filled[3], 28.0 / 3.0);
        assert_eq!(filled[4], 16.0);
    }
}
