//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! Follows the inner loop of Cleveland et al. (1990): detrend, smooth each
//! cycle-subseries, remove the low-pass component, deseasonalise, smooth
//! the trend. An optional outer loop recomputes bisquare robustness weights
//! from the remainder.

use super::{validate_input, Decomposer, Decomposition, DecompositionKind};
use crate::core::TimeSeries;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Trend span used when the series has no seasonal cycle.
const ANNUAL_TREND_SPAN: usize = 7;

/// Seasonal smoothing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalWindow {
    /// Identical seasonal shape in every cycle.
    Periodic,
    /// Loess span in cycles; forced odd and at least 3. Smaller spans let
    /// the seasonal pattern evolve faster.
    Span(usize),
}

/// STL settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StlConfig {
    /// Seasonal window; `None` uses a span equal to the period.
    pub seasonal_window: Option<SeasonalWindow>,
    /// Trend loess span; `None` follows Cleveland's default.
    pub trend_window: Option<usize>,
    /// Low-pass loess span; `None` uses the period.
    pub low_pass_window: Option<usize>,
    pub inner_iterations: usize,
    pub outer_iterations: usize,
    pub robust: bool,
}

impl Default for StlConfig {
    fn default() -> Self {
        Self {
            seasonal_window: None,
            trend_window: None,
            low_pass_window: None,
            inner_iterations: 2,
            outer_iterations: 2,
            robust: false,
        }
    }
}

impl StlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seasonal_window(mut self, window: SeasonalWindow) -> Self {
        self.seasonal_window = Some(window);
        self
    }

    pub fn with_trend_window(mut self, span: usize) -> Self {
        self.trend_window = Some(span);
        self
    }

    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(1);
        self
    }

    /// Enable bisquare robustness weights with `outer` reweighting passes.
    pub fn robust(mut self, outer: usize) -> Self {
        self.robust = true;
        self.outer_iterations = outer;
        self
    }

    fn seasonal_span(&self, period: usize) -> Option<usize> {
        match self.seasonal_window {
            Some(SeasonalWindow::Periodic) => None,
            Some(SeasonalWindow::Span(span)) => Some(odd_at_least_3(span)),
            None => Some(odd_at_least_3(period)),
        }
    }

    fn trend_span(&self, period: usize, n: usize) -> usize {
        if let Some(span) = self.trend_window {
            return odd_at_least_3(span);
        }
        if period <= 1 {
            return odd_at_least_3(ANNUAL_TREND_SPAN);
        }
        let ns = self.seasonal_span(period).unwrap_or(10 * n + 1) as f64;
        let nt = (1.5 * period as f64 / (1.0 - 1.5 / ns)).ceil() as usize;
        odd_at_least_3(nt)
    }

    fn passes(&self) -> usize {
        if self.robust {
            self.outer_iterations + 1
        } else {
            1
        }
    }

    /// Decompose additive data, returning `(trend, seasonal)`.
    fn fit_components(&self, y: &[f64], period: usize) -> (Vec<f64>, Vec<f64>) {
        let n = y.len();
        let nt = self.trend_span(period, n);
        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];

        let passes = self.passes();
        for pass in 0..passes {
            if period > 1 {
                for _ in 0..self.inner_iterations.max(1) {
                    let detrended: Vec<f64> = y.iter().zip(&trend).map(|(v, t)| v - t).collect();

                    seasonal = match self.seasonal_span(period) {
                        None => periodic_seasonal(&detrended, &weights, period),
                        Some(ns) => {
                            let cycle = smooth_cycle_subseries(&detrended, &weights, period, ns);
                            let nl = odd_at_least_3(self.low_pass_window.unwrap_or(period));
                            let low_pass = low_pass_filter(&cycle, period, nl);
                            cycle.iter().zip(&low_pass).map(|(c, l)| c - l).collect()
                        }
                    };

                    let deseasonalized: Vec<f64> =
                        y.iter().zip(&seasonal).map(|(v, s)| v - s).collect();
                    trend = loess(&deseasonalized, nt, &weights);
                }
            } else {
                trend = loess(y, nt, &weights);
            }

            if pass + 1 < passes {
                let remainder: Vec<f64> = y
                    .iter()
                    .zip(&trend)
                    .zip(&seasonal)
                    .map(|((v, t), s)| v - t - s)
                    .collect();
                weights = robustness_weights(&remainder);
            }
        }

        (trend, seasonal)
    }
}

impl Decomposer for StlConfig {
    fn decompose(&self, series: &TimeSeries, kind: DecompositionKind) -> Result<Decomposition> {
        validate_input(series, kind)?;
        let period = series.period();

        let (trend, seasonal) = match kind {
            DecompositionKind::Additive => self.fit_components(series.values(), period),
            DecompositionKind::Multiplicative => {
                let logs: Vec<f64> = series.values().iter().map(|v| v.ln()).collect();
                let (trend, seasonal) = self.fit_components(&logs, period);
                (
                    trend.into_iter().map(f64::exp).collect(),
                    seasonal.into_iter().map(f64::exp).collect(),
                )
            }
        };

        Ok(Decomposition::from_components(
            series,
            trend,
            seasonal,
            kind,
            self.name(),
        ))
    }

    fn name(&self) -> &'static str {
        "stl"
    }
}

fn odd_at_least_3(n: usize) -> usize {
    let n = n.max(3);
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Weighted mean of each cycle position, centred to sum to zero over a cycle.
fn periodic_seasonal(detrended: &[f64], weights: &[f64], period: usize) -> Vec<f64> {
    let means: Vec<f64> = (0..period)
        .map(|pos| {
            let (sum, total) = detrended
                .iter()
                .zip(weights)
                .skip(pos)
                .step_by(period)
                .fold((0.0, 0.0), |(s, t), (v, w)| (s + w * v, t + w));
            if total > 0.0 {
                sum / total
            } else {
                0.0
            }
        })
        .collect();
    let centre = means.iter().sum::<f64>() / period as f64;
    (0..detrended.len())
        .map(|i| means[i % period] - centre)
        .collect()
}

/// Loess-smooth each cycle-subseries and write results back in place.
fn smooth_cycle_subseries(detrended: &[f64], weights: &[f64], period: usize, span: usize) -> Vec<f64> {
    let mut result = vec![0.0; detrended.len()];
    for pos in 0..period {
        let values: Vec<f64> = detrended.iter().skip(pos).step_by(period).copied().collect();
        let sub_weights: Vec<f64> = weights.iter().skip(pos).step_by(period).copied().collect();
        let smoothed = loess(&values, span, &sub_weights);
        for (k, v) in smoothed.into_iter().enumerate() {
            result[pos + k * period] = v;
        }
    }
    result
}

/// Moving averages of length period, period and 3 followed by a loess pass.
fn low_pass_filter(series: &[f64], period: usize, span: usize) -> Vec<f64> {
    let ma = moving_average(&moving_average(&moving_average(series, period), period), 3);
    loess(&ma, span, &vec![1.0; series.len()])
}

/// Centred moving average with windows truncated at the ends.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            series[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

/// Degree-1 local regression with tricube neighbourhood weights scaled by
/// `robustness`.
///
/// Each fit uses the `span` nearest positions. When `span` exceeds the data
/// length the bandwidth is widened so that all points keep some weight.
fn loess(values: &[f64], span: usize, robustness: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = span.min(n);

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(q / 2).min(n - q);
            let end = start + q;
            let reach = (i - start).max(end - 1 - i) as f64;
            let bandwidth = reach + 1.0 + span.saturating_sub(n) as f64 / 2.0;

            let mut sw = 0.0;
            let mut sx = 0.0;
            let mut sy = 0.0;
            let mut local = Vec::with_capacity(q);
            for j in start..end {
                let u = (j as f64 - i as f64).abs() / bandwidth;
                let tricube = if u < 1.0 { (1.0 - u.powi(3)).powi(3) } else { 0.0 };
                let w = tricube * robustness[j];
                if w > 0.0 {
                    sw += w;
                    sx += w * j as f64;
                    sy += w * values[j];
                    local.push((j as f64, values[j], w));
                }
            }
            if sw <= 0.0 {
                return values[i];
            }

            let x_bar = sx / sw;
            let y_bar = sy / sw;
            let (sxx, sxy) = local.iter().fold((0.0, 0.0), |(sxx, sxy), &(x, y, w)| {
                (sxx + w * (x - x_bar).powi(2), sxy + w * (x - x_bar) * (y - y_bar))
            });
            let slope = if sxx > 1e-12 { sxy / sxx } else { 0.0 };
            y_bar + slope * (i as f64 - x_bar)
        })
        .collect()
}

/// Bisquare weights from the remainder, scaled by six times its median
/// absolute value.
fn robustness_weights(remainder: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    abs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = abs.len();
    let median = if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (abs[n / 2 - 1] + abs[n / 2]) / 2.0
    } else {
        abs[n / 2]
    };

    let h = 6.0 * median;
    if h < 1e-10 {
        return vec![1.0; n];
    }
    remainder
        .iter()
        .map(|r| {
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}
