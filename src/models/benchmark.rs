//! Benchmark forecasting methods.
//!
//! Mean, naive, seasonal naive and drift forecasts with the standard
//! closed-form interval widths. They are the baselines every other model
//! should beat.

use super::spec::BenchmarkMethod;
use super::traits::Forecaster;
use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::utils::stats::{interval_z, mean, mean_square_finite};

/// A fitted benchmark method.
#[derive(Debug, Clone)]
pub struct Benchmark {
    method: BenchmarkMethod,
    period: usize,
    history: Option<TimeSeries>,
    /// Mean for `Mean`, average step for `Drift`, unused otherwise.
    location: f64,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    sigma: f64,
}

impl Benchmark {
    pub fn new(method: BenchmarkMethod, period: usize) -> Self {
        Self {
            method,
            period: period.max(1),
            history: None,
            location: 0.0,
            fitted: None,
            residuals: None,
            sigma: 0.0,
        }
    }

    pub fn method(&self) -> BenchmarkMethod {
        self.method
    }

    /// Residual standard deviation used for the intervals.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn lag(&self) -> usize {
        match self.method {
            BenchmarkMethod::SeasonalNaive => self.period,
            _ => 1,
        }
    }

    fn min_observations(&self) -> usize {
        match self.method {
            BenchmarkMethod::Mean | BenchmarkMethod::Naive => 1,
            BenchmarkMethod::SeasonalNaive => self.period,
            BenchmarkMethod::Drift => 2,
        }
    }

    /// Standard error multiplier at step `h` for a training length `t`.
    fn se_factor(&self, h: usize, t: usize) -> f64 {
        let h_f = h as f64;
        let t_f = t as f64;
        match self.method {
            BenchmarkMethod::Mean => (1.0 + 1.0 / t_f).sqrt(),
            BenchmarkMethod::Naive => h_f.sqrt(),
            BenchmarkMethod::SeasonalNaive => (((h - 1) / self.period) as f64 + 1.0).sqrt(),
            BenchmarkMethod::Drift => (h_f * (1.0 + h_f / t_f)).sqrt(),
        }
    }
}

impl Forecaster for Benchmark {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        if values.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        let needed = self.min_observations();
        if values.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Domain(format!(
                "{} requires finite observations",
                self.method
            )));
        }

        let n = values.len();
        let fitted: Vec<f64> = match self.method {
            BenchmarkMethod::Mean => {
                self.location = mean(values);
                vec![self.location; n]
            }
            BenchmarkMethod::Naive | BenchmarkMethod::SeasonalNaive => {
                let lag = self.lag();
                (0..n)
                    .map(|t| if t >= lag { values[t - lag] } else { f64::NAN })
                    .collect()
            }
            BenchmarkMethod::Drift => {
                self.location = (values[n - 1] - values[0]) / (n - 1) as f64;
                (0..n)
                    .map(|t| {
                        if t >= 1 {
                            values[t - 1] + self.location
                        } else {
                            f64::NAN
                        }
                    })
                    .collect()
            }
        };

        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        self.sigma = mean_square_finite(&residuals).map_or(0.0, f64::sqrt);

        tracing::debug!(method = %self.method, sigma = self.sigma, "benchmark fitted");

        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        self.history = Some(series.clone());
        Ok(())
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let history = self.history.as_ref().ok_or_else(|| {
            ForecastError::ComputationError("model must be fitted before forecasting".to_string())
        })?;
        let values = history.values();
        let n = values.len();
        let last = values[n - 1];
        let z = interval_z(level);

        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let mean = match self.method {
                BenchmarkMethod::Mean => self.location,
                BenchmarkMethod::Naive => last,
                BenchmarkMethod::SeasonalNaive => values[n - self.period + (h - 1) % self.period],
                BenchmarkMethod::Drift => last + h as f64 * self.location,
            };
            let se = self.sigma * self.se_factor(h, n);
            point.push(mean);
            lower.push(mean - z * se);
            upper.push(mean + z * se);
        }

        Forecast::new(history.future_timestamps(horizon)?, point, lower, upper, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        match self.method {
            BenchmarkMethod::Mean => "MEAN",
            BenchmarkMethod::Naive => "NAIVE",
            BenchmarkMethod::SeasonalNaive => "SNAIVE",
            BenchmarkMethod::Drift => "DRIFT",
        }
    }

    fn num_parameters(&self) -> usize {
        match self.method {
            BenchmarkMethod::Mean | BenchmarkMethod::Drift => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn quarterly(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap()
    }

    fn fit(method: BenchmarkMethod, values: Vec<f64>) -> Benchmark {
        let mut model = Benchmark::new(method, 4);
        model.fit(&quarterly(values)).unwrap();
        model
    }

    #[test]
    fn mean_forecast_is_flat() {
        let model = fit(BenchmarkMethod::Mean, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let fc = model.predict_with_intervals(3, 0.95).unwrap();
        assert!(fc.point().iter().all(|&p| (p - 3.0).abs() < 1e-12));
        assert_relative_eq!(model.sigma(), 2.0f64.sqrt(), epsilon = 1e-12);

        let width = fc.upper()[0] - fc.lower()[0];
        let expected = 2.0 * interval_z(0.95) * 2.0f64.sqrt() * (1.2f64).sqrt();
        assert_relative_eq!(width, expected, epsilon = 1e-9);
        assert_relative_eq!(fc.upper()[2] - fc.lower()[2], width, epsilon = 1e-12);
    }

    #[test]
    fn naive_repeats_last_value_with_sqrt_h_width() {
        let model = fit(BenchmarkMethod::Naive, vec![1.0, 3.0, 2.0, 4.0, 3.0]);
        let fc = model.predict_with_intervals(4, 0.95).unwrap();
        assert!(fc.point().iter().all(|&p| p == 3.0));

        let w1 = fc.upper()[0] - fc.lower()[0];
        let w4 = fc.upper()[3] - fc.lower()[3];
        assert_relative_eq!(w4 / w1, 2.0, epsilon = 1e-12);

        let residuals = model.residuals().unwrap();
        assert!(residuals[0].is_nan());
        assert_eq!(&residuals[1..], &[2.0, -1.0, 2.0, -1.0]);
    }

    #[test]
    fn seasonal_naive_repeats_last_cycle() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 5.0];
        let model = fit(BenchmarkMethod::SeasonalNaive, values);
        let fc = model.predict_with_intervals(6, 0.95).unwrap();
        assert_eq!(fc.point(), &[2.0, 3.0, 4.0, 5.0, 2.0, 3.0]);

        // Width steps up once per completed cycle.
        let widths: Vec<f64> = fc.lower().iter().zip(fc.upper()).map(|(l, u)| u - l).collect();
        assert_relative_eq!(widths[0], widths[3], epsilon = 1e-12);
        assert_relative_eq!(widths[4] / widths[0], 2.0f64.sqrt(), epsilon = 1e-12);

        let residuals = model.residuals().unwrap();
        assert!(residuals[..4].iter().all(|r| r.is_nan()));
        assert!(residuals[4..].iter().all(|&r| r == 1.0));
    }

    #[test]
    fn drift_extends_first_to_last_line() {
        let model = fit(BenchmarkMethod::Drift, vec![10.0, 12.0, 13.0, 16.0]);
        let fc = model.predict_with_intervals(2, 0.9).unwrap();
        assert_relative_eq!(fc.point()[0], 18.0, epsilon = 1e-12);
        assert_relative_eq!(fc.point()[1], 20.0, epsilon = 1e-12);
    }

    #[test]
    fn forecast_timestamps_continue_history() {
        let model = fit(BenchmarkMethod::Naive, vec![1.0, 2.0, 3.0]);
        let fc = model.predict_with_intervals(2, 0.95).unwrap();
        assert_eq!(fc.timestamps()[0], NaiveDate::from_ymd_opt(2010, 10, 1).unwrap());
        assert_eq!(fc.timestamps()[1], NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
    }

    #[test]
    fn seasonal_naive_needs_one_cycle() {
        let mut model = Benchmark::new(BenchmarkMethod::SeasonalNaive, 4);
        assert!(matches!(
            model.fit(&quarterly(vec![1.0, 2.0, 3.0])),
            Err(ForecastError::InsufficientData { needed: 4, got: 3 })
        ));
    }

    #[test]
    fn drift_needs_two_points() {
        let mut model = Benchmark::new(BenchmarkMethod::Drift, 1);
        assert!(model.fit(&quarterly(vec![1.0])).is_err());
    }
}
