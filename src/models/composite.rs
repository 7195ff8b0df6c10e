//! Decomposition-based forecasting.
//!
//! The series is split into seasonal and non-seasonal parts, a sub-model is
//! fitted to the seasonally adjusted series and its forecasts are recombined
//! with the last seasonal cycle repeated forward.

use super::traits::{BoxedForecaster, Forecaster};
use crate::core::{Forecast, TimeSeries};
use crate::decomposition::{decompose, Decomposition, DecompositionKind, DecompositionMethod};
use crate::error::{ForecastError, Result};

/// Decompose-then-forecast model.
pub struct CompositeModel {
    method: DecompositionMethod,
    kind: DecompositionKind,
    sub: BoxedForecaster,
    label: String,
    decomposition: Option<Decomposition>,
    fitted: Option<Vec<f64>>,
}

impl CompositeModel {
    pub fn new(method: DecompositionMethod, kind: DecompositionKind, sub: BoxedForecaster) -> Self {
        let label = format!("{} + {}", method.name().to_uppercase(), sub.name());
        Self {
            method,
            kind,
            sub,
            label,
            decomposition: None,
            fitted: None,
        }
    }

    pub fn kind(&self) -> DecompositionKind {
        self.kind
    }
}

impl std::fmt::Debug for CompositeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeModel")
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("sub", &self.sub.name())
            .field("fitted", &self.fitted.is_some())
            .finish()
    }
}

impl Forecaster for CompositeModel {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let decomposition = decompose(series, &self.method, self.kind)?;
        let adjusted = series.with_values(decomposition.seasonally_adjusted())?;
        self.sub.fit(&adjusted)?;

        let kind = self.kind;
        let fitted = self
            .sub
            .fitted_values()
            .map(|values| {
                values
                    .iter()
                    .zip(&decomposition.seasonal)
                    .map(|(&f, &s)| kind.combine(f, s))
                    .collect()
            })
            .unwrap_or_else(|| vec![f64::NAN; series.len()]);

        self.fitted = Some(fitted);
        self.decomposition = Some(decomposition);
        Ok(())
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let decomposition = self.decomposition.as_ref().ok_or_else(|| {
            ForecastError::ComputationError("model must be fitted before forecasting".to_string())
        })?;
        let kind = self.kind;
        self.sub
            .predict_with_intervals(horizon, level)?
            .combine(&decomposition.extrapolate_seasonal(horizon), |v, s| {
                kind.combine(v, s)
            })
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    /// Innovation residuals of the sub-model on the adjusted series.
    fn residuals(&self) -> Option<&[f64]> {
        self.sub.residuals()
    }

    fn name(&self) -> &str {
        &self.label
    }

    fn information_criteria(&self) -> Option<super::InformationCriteria> {
        self.sub.information_criteria()
    }

    fn num_parameters(&self) -> usize {
        self.sub.num_parameters()
    }

    fn decomposition(&self) -> Option<&Decomposition> {
        self.decomposition.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use crate::decomposition::{StlConfig, X11Config};
    use crate::models::{Benchmark, BenchmarkMethod, Ets, EtsSpec};
    use chrono::NaiveDate;

    const PATTERN: [f64; 4] = [4.0, -1.0, -5.0, 2.0];

    fn quarterly(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        let values = (0..n)
            .map(|i| 50.0 + 0.8 * i as f64 + PATTERN[i % 4] + if i % 3 == 0 { 0.2 } else { -0.1 })
            .collect();
        TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap()
    }

    #[test]
    fn composite_restores_seasonal_pattern_in_forecast() {
        let mut model = CompositeModel::new(
            DecompositionMethod::Stl(StlConfig::default()),
            DecompositionKind::Additive,
            Box::new(Ets::new(EtsSpec::aan(), 4)),
        );
        model.fit(&quarterly(40)).unwrap();

        let fc = model.predict_with_intervals(4, 0.95).unwrap();
        // Quarter 1 peaks, quarter 3 troughs.
        assert!(fc.point()[0] > fc.point()[2] + 5.0);
        for row in fc.rows() {
            assert!(row.lower <= row.point && row.point <= row.upper);
        }
        assert_eq!(model.name(), "STL + ETS");
        assert_eq!(model.fitted_values().unwrap().len(), 40);
    }

    #[test]
    fn composite_with_x11_and_benchmark() {
        let mut model = CompositeModel::new(
            DecompositionMethod::X11(X11Config::default()),
            DecompositionKind::Additive,
            Box::new(Benchmark::new(BenchmarkMethod::Drift, 4)),
        );
        model.fit(&quarterly(32)).unwrap();
        let fc = model.predict_with_intervals(8, 0.9).unwrap();
        assert_eq!(fc.horizon(), 8);
        let seasonal = &model.decomposition().unwrap().seasonal;
        let diff_a = fc.point()[4] - fc.point()[0];
        let diff_b = fc.point()[6] - fc.point()[2];
        // Same season one year apart differs only by the drift.
        assert!((diff_a - diff_b).abs() < 1e-9);
        assert!((seasonal[0] - PATTERN[0]).abs() < 1.0);
    }

    #[test]
    fn composite_needs_two_cycles() {
        let mut model = CompositeModel::new(
            DecompositionMethod::default(),
            DecompositionKind::Additive,
            Box::new(Ets::new(EtsSpec::ann(), 4)),
        );
        assert!(matches!(
            model.fit(&quarterly(4)),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
