//! Forecast result structure for holding predictions.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// Default confidence level for prediction intervals.
pub const DEFAULT_LEVEL: f64 = 0.95;

/// A forecast with point predictions and prediction interval bounds.
///
/// All vectors share the same length and are aligned with `timestamps`,
/// which continue the training index without gaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    timestamps: Vec<NaiveDate>,
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    level: f64,
}

/// One step of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRow {
    pub timestamp: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Forecast {
    /// Create a forecast, validating that all vectors are aligned.
    pub fn new(
        timestamps: Vec<NaiveDate>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        level: f64,
    ) -> Result<Self> {
        let n = timestamps.len();
        for len in [point.len(), lower.len(), upper.len()] {
            if len != n {
                return Err(ForecastError::DimensionMismatch {
                    expected: n,
                    got: len,
                });
            }
        }
        if !(level > 0.0 && level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {}",
                level
            )));
        }

        Ok(Self {
            timestamps,
            point,
            lower,
            upper,
            level,
        })
    }

    /// Get the forecast horizon (number of steps).
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    /// Check if forecast is empty.
    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Confidence level of the interval bounds.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Iterate over `(timestamp, point, lower, upper)` rows.
    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        self.timestamps
            .iter()
            .zip(&self.point)
            .zip(self.lower.iter().zip(&self.upper))
            .map(|((&timestamp, &point), (&lower, &upper))| ForecastRow {
                timestamp,
                point,
                lower,
                upper,
            })
    }

    /// Apply `f` to the point forecast and to each bound independently.
    ///
    /// For a monotone increasing `f` the bounds stay ordered.
    pub fn map_values<F>(&self, f: F) -> Forecast
    where
        F: Fn(f64) -> f64,
    {
        Forecast {
            timestamps: self.timestamps.clone(),
            point: self.point.iter().map(|&v| f(v)).collect(),
            lower: self.lower.iter().map(|&v| f(v)).collect(),
            upper: self.upper.iter().map(|&v| f(v)).collect(),
            level: self.level,
        }
    }

    /// Combine each step with an offset using `op`, e.g. adding back a
    /// seasonal component.
    pub fn combine<F>(&self, offsets: &[f64], op: F) -> Result<Forecast>
    where
        F: Fn(f64, f64) -> f64,
    {
        if offsets.len() != self.horizon() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.horizon(),
                got: offsets.len(),
            });
        }
        let apply = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .zip(offsets)
                .map(|(&v, &o)| op(v, o))
                .collect()
        };

        Ok(Forecast {
            timestamps: self.timestamps.clone(),
            point: apply(&self.point),
            lower: apply(&self.lower),
            upper: apply(&self.upper),
            level: self.level,
        })
    }
}
