//! Fitting model specifications to a series.
//!
//! [`FittedModel`] binds a [`ModelSpec`] to the series it was trained on and
//! handles the transform round trip. [`fit`] fits a whole registry at once,
//! in parallel, recording a per-model outcome.

use super::benchmark::Benchmark;
use super::composite::CompositeModel;
use super::ets::Ets;
use super::spec::{ModelSpec, OptimizerBudget};
use super::traits::{BoxedForecaster, Forecaster, InformationCriteria, ModelRegistry};
use crate::core::{Forecast, TimeSeries, DEFAULT_LEVEL};
use crate::decomposition::Decomposition;
use crate::error::{ForecastError, Result};
use crate::transform::TransformSpec;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Settings shared by every model in a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Transform applied before fitting and inverted on forecasts.
    pub transform: Option<TransformSpec>,
    /// Prediction interval coverage.
    pub level: f64,
    /// Optimiser budget for models that do not carry their own.
    pub budget: OptimizerBudget,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            transform: None,
            level: DEFAULT_LEVEL,
            budget: OptimizerBudget::default(),
        }
    }
}

impl FitConfig {
    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }

    pub fn with_budget(mut self, budget: OptimizerBudget) -> Self {
        self.budget = budget;
        self
    }

    fn transform(&self) -> TransformSpec {
        self.transform.unwrap_or(TransformSpec::Identity)
    }
}

/// Build an unfitted forecaster for `spec`.
pub fn build_forecaster(spec: &ModelSpec, period: usize, budget: OptimizerBudget) -> BoxedForecaster {
    match spec {
        ModelSpec::Ets {
            spec,
            budget: own_budget,
        } => Box::new(Ets::new(*spec, period).with_budget(own_budget.unwrap_or(budget))),
        ModelSpec::Benchmark(method) => Box::new(Benchmark::new(*method, period)),
        ModelSpec::Composite { method, kind, sub } => Box::new(CompositeModel::new(
            method.clone(),
            *kind,
            build_forecaster(sub, period, budget),
        )),
    }
}

/// Checks on the series itself, independent of any model.
pub(crate) fn validate_series(series: &TimeSeries, transform: &TransformSpec) -> Result<()> {
    if series.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    series.assert_regular()?;
    if series.has_missing_values() {
        return Err(ForecastError::Domain(
            "series contains missing or non-finite values".to_string(),
        ));
    }
    transform.check_domain(series.values())
}

/// A model specification fitted to a training series.
pub struct FittedModel {
    name: String,
    spec: ModelSpec,
    training: TimeSeries,
    transform: TransformSpec,
    level: f64,
    model: BoxedForecaster,
    fitted: Vec<f64>,
}

impl FittedModel {
    /// Fit `spec` to `series`. Errors are returned directly.
    pub fn fit(
        name: impl Into<String>,
        series: &TimeSeries,
        spec: &ModelSpec,
        config: &FitConfig,
    ) -> Result<Self> {
        let transform = config.transform();
        validate_series(series, &transform)?;
        spec.validate()?;
        Self::fit_validated(name.into(), series, spec, config, transform)
    }

    fn fit_validated(
        name: String,
        series: &TimeSeries,
        spec: &ModelSpec,
        config: &FitConfig,
        transform: TransformSpec,
    ) -> Result<Self> {
        let model_scale = transform.apply(series)?;
        let mut model = build_forecaster(spec, series.period(), config.budget);
        model.fit(&model_scale)?;

        let fitted = model
            .fitted_values()
            .map(|values| transform.invert_values(values))
            .unwrap_or_else(|| vec![f64::NAN; series.len()]);

        Ok(Self {
            name,
            spec: spec.clone(),
            training: series.clone(),
            transform,
            level: config.level,
            model,
            fitted,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Series the model was trained on, on the original scale.
    pub fn training(&self) -> &TimeSeries {
        &self.training
    }

    pub fn transform(&self) -> TransformSpec {
        self.transform
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// The underlying forecaster, working on the transformed scale.
    pub fn model(&self) -> &dyn Forecaster {
        self.model.as_ref()
    }

    /// Forecast `horizon` periods ahead at the configured level.
    pub fn forecast(&self, horizon: usize) -> Result<Forecast> {
        self.forecast_with_level(horizon, self.level)
    }

    /// Forecast at an explicit interval level.
    ///
    /// The point and both bounds are back-transformed separately.
    pub fn forecast_with_level(&self, horizon: usize, level: f64) -> Result<Forecast> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        let forecast = self.model.predict_with_intervals(horizon, level)?;
        let transform = self.transform;
        Ok(forecast.map_values(|v| transform.invert_value(v)))
    }

    /// One-step in-sample predictions on the original scale.
    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    /// Innovation residuals, one per training timestamp. They live on the
    /// model scale and are `NaN` where the method defines none.
    pub fn residuals(&self) -> &[f64] {
        self.model.residuals().unwrap_or(&[])
    }

    /// Decomposition behind a composite model, on the model scale.
    pub fn decomposition(&self) -> Option<&Decomposition> {
        self.model.decomposition()
    }

    /// Observed minus fitted, on the original scale.
    pub fn response_residuals(&self) -> Vec<f64> {
        self.training
            .values()
            .iter()
            .zip(&self.fitted)
            .map(|(y, f)| y - f)
            .collect()
    }

    pub fn information_criteria(&self) -> Option<InformationCriteria> {
        self.model.information_criteria()
    }

    pub fn num_parameters(&self) -> usize {
        self.model.num_parameters()
    }
}

impl std::fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedModel")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("transform", &self.transform)
            .field("n", &self.training.len())
            .finish()
    }
}

/// Outcome of fitting every model in a registry, in registration order.
#[derive(Debug)]
pub struct ModelFits {
    fits: Vec<(String, Result<FittedModel>)>,
}

impl ModelFits {
    pub fn get(&self, name: &str) -> Option<&Result<FittedModel>> {
        self.fits.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<FittedModel>)> {
        self.fits.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Successfully fitted models.
    pub fn successes(&self) -> impl Iterator<Item = &FittedModel> {
        self.fits.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    /// Recorded failures as `(name, error)`.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ForecastError)> {
        self.fits
            .iter()
            .filter_map(|(n, r)| r.as_ref().err().map(|e| (n.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Result<FittedModel>)> {
        self.fits
    }
}

/// Fit every model in `registry` to `series` in parallel.
///
/// Problems with the series itself are returned as an error. Failures of
/// individual models are recorded in the result without affecting the
/// others.
pub fn fit(series: &TimeSeries, registry: &ModelRegistry, config: &FitConfig) -> Result<ModelFits> {
    let transform = config.transform();
    validate_series(series, &transform)?;

    let specs: Vec<(&str, &ModelSpec)> = registry.iter().collect();
    let fits = specs
        .par_iter()
        .map(|&(name, spec)| {
            let outcome = spec.validate().and_then(|_| {
                FittedModel::fit_validated(name.to_string(), series, spec, config, transform)
            });
            match &outcome {
                Ok(_) => tracing::debug!(
                    series = series.key().unwrap_or("-"),
                    model = name,
                    "model fitted"
                ),
                Err(err) => tracing::warn!(
                    series = series.key().unwrap_or("-"),
                    model = name,
                    error = %err,
                    "model fit failed"
                ),
            }
            (name.to_string(), outcome)
        })
        .collect();

    Ok(ModelFits { fits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use crate::decomposition::{DecompositionKind, DecompositionMethod};
    use crate::models::{BenchmarkMethod, EtsSpec};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn monthly(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        TimeSeries::from_start(start, Frequency::Monthly, values).unwrap()
    }

    fn growing(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let season = 1.0 + 0.2 * ((i % 12) as f64 * std::f64::consts::PI / 6.0).sin();
                100.0 * (0.01 * i as f64).exp() * season
            })
            .collect()
    }

    #[test]
    fn forecast_rejects_zero_horizon() {
        let model = FittedModel::fit(
            "naive",
            &monthly(growing(24)),
            &ModelSpec::benchmark(BenchmarkMethod::Naive),
            &FitConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            model.forecast(0),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn log_transform_bounds_are_back_transformed_separately() {
        let series = monthly(growing(36));
        let config = FitConfig::default().with_transform(TransformSpec::Log);
        let model =
            FittedModel::fit("naive", &series, &ModelSpec::benchmark(BenchmarkMethod::Naive), &config)
                .unwrap();

        let fc = model.forecast(6).unwrap();
        let last = *series.values().last().unwrap();
        assert_relative_eq!(fc.point()[0], last, epsilon = 1e-9);
        for row in fc.rows() {
            assert!(row.lower > 0.0);
            // Asymmetric around the point after the exp back-transform.
            assert!(row.upper - row.point > row.point - row.lower);
        }
        assert_relative_eq!(model.fitted_values()[1], series.values()[0], epsilon = 1e-9);
    }

    #[test]
    fn forecast_continues_training_index() {
        let series = monthly(growing(30));
        let model = FittedModel::fit(
            "ses",
            &series,
            &ModelSpec::ets(EtsSpec::ann()),
            &FitConfig::default(),
        )
        .unwrap();
        let fc = model.forecast(3).unwrap();
        assert_eq!(fc.timestamps()[0], NaiveDate::from_ymd_opt(2017, 7, 1).unwrap());
        assert_eq!(fc.timestamps()[2], NaiveDate::from_ymd_opt(2017, 9, 1).unwrap());
        assert_eq!(model.residuals().len(), 30);
    }

    #[test]
    fn registry_fit_records_per_model_failures() {
        let registry = ModelRegistry::new()
            .with("naive", ModelSpec::benchmark(BenchmarkMethod::Naive))
            .unwrap()
            .with(
                "starved",
                ModelSpec::ets_with_budget(EtsSpec::aan(), OptimizerBudget::default().with_max_iter(0)),
            )
            .unwrap()
            .with(
                "stl",
                ModelSpec::composite(
                    DecompositionMethod::default(),
                    DecompositionKind::Additive,
                    ModelSpec::benchmark(BenchmarkMethod::Drift),
                ),
            )
            .unwrap();

        let fits = fit(&monthly(growing(48)), &registry, &FitConfig::default()).unwrap();
        assert_eq!(fits.len(), 3);
        assert!(fits.get("naive").unwrap().is_ok());
        assert!(fits.get("stl").unwrap().is_ok());
        assert!(matches!(
            fits.get("starved").unwrap(),
            Err(ForecastError::NonConvergence { .. })
        ));
        assert_eq!(fits.successes().count(), 2);
        assert_eq!(fits.failures().map(|(n, _)| n).collect::<Vec<_>>(), vec!["starved"]);
    }

    #[test]
    fn registry_fit_raises_series_errors() {
        let mut values = growing(24);
        values[3] = -1.0;
        let registry = ModelRegistry::new()
            .with("naive", ModelSpec::benchmark(BenchmarkMethod::Naive))
            .unwrap();
        let config = FitConfig::default().with_transform(TransformSpec::Log);
        assert!(matches!(
            fit(&monthly(values), &registry, &config),
            Err(ForecastError::Domain(_))
        ));
    }
}
