//! Variance-stabilising transforms for time series.
//!
//! A [`TransformSpec`] is resolved once per series, applied before model
//! fitting and inverted on forecasts.
//!
//! # Example
//!
//! ```
//! use forecast_pipeline::core::{Frequency, TimeSeries};
//! use forecast_pipeline::transform::{estimate_lambda, LambdaMethod, TransformSpec};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
//! let values: Vec<f64> = (0..24).map(|t| 10.0 + t as f64 + (t % 4) as f64).collect();
//! let series = TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap();
//!
//! let lambda = estimate_lambda(&series, LambdaMethod::Guerrero).unwrap();
//! let spec = TransformSpec::BoxCox { lambda };
//! let transformed = spec.apply(&series).unwrap();
//! let restored = spec.invert(&transformed).unwrap();
//! assert!((restored.values()[5] - series.values()[5]).abs() < 1e-9);
//! ```

pub mod boxcox;
pub mod guerrero;

pub use boxcox::{boxcox, boxcox_lambda_loglik, inv_boxcox, inv_boxcox_value};
pub use guerrero::guerrero_lambda;

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An invertible power transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformSpec {
    Identity,
    Log,
    BoxCox { lambda: f64 },
}

impl TransformSpec {
    /// The Box-Cox parameter, `Some(0.0)` for the log transform.
    pub fn lambda(&self) -> Option<f64> {
        match self {
            TransformSpec::Identity => None,
            TransformSpec::Log => Some(0.0),
            TransformSpec::BoxCox { lambda } => Some(*lambda),
        }
    }

    /// Check that `values` lie in the domain of the transform.
    pub fn check_domain(&self, values: &[f64]) -> Result<()> {
        match self {
            TransformSpec::Identity => Ok(()),
            _ => boxcox::check_positive(values),
        }
    }

    pub fn apply_values(&self, values: &[f64]) -> Result<Vec<f64>> {
        match self.lambda() {
            None => Ok(values.to_vec()),
            Some(lambda) => boxcox(values, lambda),
        }
    }

    pub fn invert_value(&self, value: f64) -> f64 {
        match self.lambda() {
            None => value,
            Some(lambda) => inv_boxcox_value(value, lambda),
        }
    }

    pub fn invert_values(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.invert_value(v)).collect()
    }

    /// Transform a series, keeping its index.
    pub fn apply(&self, series: &TimeSeries) -> Result<TimeSeries> {
        series.with_values(self.apply_values(series.values())?)
    }

    /// Back-transform a series, keeping its index.
    pub fn invert(&self, series: &TimeSeries) -> Result<TimeSeries> {
        series.with_values(self.invert_values(series.values()))
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformSpec::Identity => write!(f, "identity"),
            TransformSpec::Log => write!(f, "log"),
            TransformSpec::BoxCox { lambda } => write!(f, "box_cox({:.4})", lambda),
        }
    }
}

/// Criterion used to choose the Box-Cox parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaMethod {
    /// Minimise the variation of subseries sd / mean^(1 - lambda).
    Guerrero,
    /// Maximise the Box-Cox profile log-likelihood.
    LogLikelihood,
}

/// Search settings for lambda estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaSearch {
    pub method: LambdaMethod,
    pub lower: f64,
    pub upper: f64,
    /// Subseries length for Guerrero; defaults to the series period.
    pub period: Option<usize>,
}

impl Default for LambdaSearch {
    fn default() -> Self {
        Self {
            method: LambdaMethod::Guerrero,
            lower: -1.0,
            upper: 2.0,
            period: None,
        }
    }
}

impl LambdaSearch {
    pub fn new(method: LambdaMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    /// Estimate lambda for `series`.
    pub fn estimate(&self, series: &TimeSeries) -> Result<f64> {
        if series.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        if !(self.lower < self.upper) {
            return Err(ForecastError::InvalidParameter(format!(
                "lambda bounds [{}, {}] are empty",
                self.lower, self.upper
            )));
        }

        match self.method {
            LambdaMethod::Guerrero => {
                let period = self.period.unwrap_or_else(|| series.period());
                guerrero_lambda(series.values(), period, self.lower, self.upper)
            }
            LambdaMethod::LogLikelihood => {
                boxcox_lambda_loglik(series.values(), self.lower, self.upper)
            }
        }
    }
}

/// Estimate the Box-Cox parameter on `[-1, 2]` with the given method.
pub fn estimate_lambda(series: &TimeSeries, method: LambdaMethod) -> Result<f64> {
    LambdaSearch::new(method).estimate(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn quarterly(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap()
    }

    #[test]
    fn transform_spec_reports_lambda() {
        assert_eq!(TransformSpec::Identity.lambda(), None);
        assert_eq!(TransformSpec::Log.lambda(), Some(0.0));
        assert_eq!(TransformSpec::BoxCox { lambda: 0.3 }.lambda(), Some(0.3));
    }

    #[test]
    fn transform_spec_roundtrips_series() {
        let series = quarterly(vec![3.0, 5.0, 8.0, 13.0, 21.0, 34.0]);
        for spec in [
            TransformSpec::Identity,
            TransformSpec::Log,
            TransformSpec::BoxCox { lambda: -0.7 },
            TransformSpec::BoxCox { lambda: 1.5 },
        ] {
            let restored = spec.invert(&spec.apply(&series).unwrap()).unwrap();
            assert_eq!(restored.timestamps(), series.timestamps());
            for (a, b) in restored.values().iter().zip(series.values()) {
                assert_relative_eq!(*a, *b, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn transform_spec_domain_errors() {
        let series = quarterly(vec![1.0, -2.0, 3.0]);
        assert!(TransformSpec::Identity.apply(&series).is_ok());
        assert!(matches!(
            TransformSpec::Log.apply(&series),
            Err(ForecastError::Domain(_))
        ));
        assert!(matches!(
            estimate_lambda(&series, LambdaMethod::Guerrero),
            Err(ForecastError::Domain(_))
        ));
    }

    #[test]
    fn transform_spec_deserializes_from_json() {
        let spec: TransformSpec = serde_json::from_str(r#"{"type":"box_cox","lambda":0.25}"#).unwrap();
        assert_eq!(spec, TransformSpec::BoxCox { lambda: 0.25 });
        let spec: TransformSpec = serde_json::from_str(r#"{"type":"log"}"#).unwrap();
        assert_eq!(spec, TransformSpec::Log);
    }

    #[test]
    fn lambda_search_validates_bounds() {
        let series = quarterly((1..=16).map(|x| x as f64).collect());
        let search = LambdaSearch::new(LambdaMethod::LogLikelihood).with_bounds(1.0, 1.0);
        assert!(matches!(
            search.estimate(&series),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn both_methods_stay_in_bounds() {
        let values: Vec<f64> = (0..32)
            .map(|t| 20.0 * (0.05 * t as f64).exp() * (1.0 + 0.2 * ((t % 4) as f64 - 1.5)))
            .collect();
        let series = quarterly(values);
        for method in [LambdaMethod::Guerrero, LambdaMethod::LogLikelihood] {
            let lambda = estimate_lambda(&series, method).unwrap();
            assert!((-1.0..=2.0).contains(&lambda));
        }
    }
}
