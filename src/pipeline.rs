//! End-to-end evaluation of a model registry on one series or a store of
//! series.
//!
//! For each series: validate, resolve the transform once on the full
//! series, optionally decompose, fit every model on the training part,
//! evaluate in-sample and on the holdout, check residuals, cross-validate,
//! and collect everything into an [`AccuracyReport`].

use crate::core::{Forecast, SeriesStore, TimeSeries, DEFAULT_LEVEL};
use crate::decomposition::{decompose, Decomposition, DecompositionKind, DecompositionMethod};
use crate::error::{ForecastError, Result};
use crate::models::{
    fit, validate_series, FitConfig, FittedModel, InformationCriteria, ModelFits, ModelRegistry,
    OptimizerBudget,
};
use crate::report::{AccuracyReport, Regime};
use crate::transform::{estimate_lambda, LambdaMethod, TransformSpec};
use crate::utils::cross_validation::{cross_validate, CVConfig, CVResults};
use crate::utils::metrics::{accuracy_with_scale, training_accuracy};
use crate::validation::{residual_diagnostics, ResidualDiagnostics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the transform is chosen for each series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformChoice {
    /// Fit on the original scale.
    #[default]
    None,
    /// Use this transform for every series.
    Fixed(TransformSpec),
    /// Estimate a Box-Cox parameter per series.
    Estimate(LambdaMethod),
}

/// Decomposition to include in the output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionRequest {
    pub method: DecompositionMethod,
    pub kind: DecompositionKind,
}

/// Pipeline settings.
///
/// # Example
/// ```
/// use forecast_pipeline::pipeline::{PipelineConfig, TransformChoice};
/// use forecast_pipeline::transform::LambdaMethod;
///
/// let config = PipelineConfig::from_json_str(r#"{
///     "transform": { "estimate": "guerrero" },
///     "test_len": 8,
///     "cv": { "initial_window": 20, "step_size": 2, "horizon": 4 }
/// }"#).unwrap();
///
/// assert_eq!(config.transform, TransformChoice::Estimate(LambdaMethod::Guerrero));
/// assert_eq!(config.cv.unwrap().horizon, 4);
/// assert_eq!(config.level, 0.95);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub transform: TransformChoice,
    /// Observations held out at the end of each series; 0 disables the
    /// test regime.
    pub test_len: usize,
    /// Forecast horizon; defaults to `test_len`, or two seasonal cycles
    /// without a holdout.
    pub horizon: Option<usize>,
    pub cv: Option<CVConfig>,
    /// Prediction interval level.
    pub level: f64,
    /// Ljung-Box lags; `None` uses the default lag rule.
    pub lb_lags: Option<usize>,
    pub budget: OptimizerBudget,
    pub decomposition: Option<DecompositionRequest>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transform: TransformChoice::None,
            test_len: 0,
            horizon: None,
            cv: None,
            level: DEFAULT_LEVEL,
            lb_lags: None,
            budget: OptimizerBudget::default(),
            decomposition: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| ForecastError::InvalidParameter(format!("pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.level > 0.0 && self.level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must lie in (0, 1), got {}",
                self.level
            )));
        }
        if self.horizon == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_transform(mut self, transform: TransformChoice) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_test_len(mut self, test_len: usize) -> Self {
        self.test_len = test_len;
        self
    }

    pub fn with_cv(mut self, cv: CVConfig) -> Self {
        self.cv = Some(cv);
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

    pub fn with_decomposition(mut self, method: DecompositionMethod, kind: DecompositionKind) -> Self {
        self.decomposition = Some(DecompositionRequest { method, kind });
        self
    }

    fn horizon(&self, period: usize) -> usize {
        self.horizon.unwrap_or(if self.test_len > 0 {
            self.test_len
        } else {
            2 * period.max(1)
        })
    }
}

/// Per-model results of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutput {
    pub name: String,
    pub description: String,
    pub forecast: Option<Forecast>,
    pub diagnostics: Option<ResidualDiagnostics>,
    pub information_criteria: Option<InformationCriteria>,
    /// Innovation residuals on the model scale; `NaN` (null) during warm-up.
    pub residuals: Vec<f64>,
    /// Training decomposition of composite models.
    pub decomposition: Option<Decomposition>,
    /// Fit failure, if any.
    pub error: Option<ForecastError>,
}

/// Everything produced for one series.
#[derive(Debug, Serialize)]
pub struct PipelineOutput {
    pub series: String,
    pub transform: TransformSpec,
    pub decomposition: Option<Decomposition>,
    pub models: Vec<ModelOutput>,
    pub cv: Option<CVResults>,
    pub report: AccuracyReport,
    #[serde(skip)]
    pub fits: ModelFits,
}

impl PipelineOutput {
    pub fn model(&self, name: &str) -> Option<&ModelOutput> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Results for every series in a store, plus their merged report.
#[derive(Debug)]
pub struct StoreOutput {
    pub outputs: Vec<(String, Result<PipelineOutput>)>,
    pub report: AccuracyReport,
}

/// Runs the evaluation flow with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the transform on the full series.
    fn resolve_transform(&self, series: &TimeSeries) -> Result<TransformSpec> {
        let transform = match self.config.transform {
            TransformChoice::None => TransformSpec::Identity,
            TransformChoice::Fixed(spec) => spec,
            TransformChoice::Estimate(method) => TransformSpec::BoxCox {
                lambda: estimate_lambda(series, method)?,
            },
        };
        transform.check_domain(series.values())?;
        Ok(transform)
    }

    /// Evaluate every model in `registry` on `series`.
    ///
    /// Problems with the series or the configuration are returned as
    /// errors; model and fold failures are recorded in the output.
    pub fn run(&self, series: &TimeSeries, registry: &ModelRegistry) -> Result<PipelineOutput> {
        self.config.validate()?;
        let key = series.key().unwrap_or("series").to_string();
        validate_series(series, &TransformSpec::Identity)?;

        let transform = self.resolve_transform(series)?;
        tracing::info!(series = %key, transform = %transform, n = series.len(), "transform resolved");

        let (train, test) = if self.config.test_len > 0 {
            let (train, test) = series.train_test_split(self.config.test_len)?;
            (train, Some(test))
        } else {
            (series.clone(), None)
        };

        let decomposition = match &self.config.decomposition {
            Some(request) => {
                let result = decompose(&transform.apply(&train)?, &request.method, request.kind)?;
                tracing::info!(series = %key, method = %result.method, "decomposition computed");
                Some(result)
            }
            None => None,
        };

        let fit_config = FitConfig {
            transform: Some(transform),
            level: self.config.level,
            budget: self.config.budget,
        };
        let fits = fit(&train, registry, &fit_config)?;
        tracing::info!(
            series = %key,
            fitted = fits.successes().count(),
            failed = fits.failures().count(),
            "models fitted"
        );

        let horizon = self.config.horizon(series.period());
        let mut report = AccuracyReport::new();
        let mut models = Vec::with_capacity(fits.len());
        for ((name, outcome), (_, spec)) in fits.iter().zip(registry.iter()) {
            let model = match outcome {
                Ok(fitted) => self.evaluate_model(&key, fitted, test.as_ref(), horizon, &mut report),
                Err(err) => {
                    report.record(&key, name, Regime::Training, Err(err.clone()));
                    if test.is_some() {
                        report.record(&key, name, Regime::Test, Err(err.clone()));
                    }
                    ModelOutput {
                        name: name.to_string(),
                        description: spec.describe(),
                        forecast: None,
                        diagnostics: None,
                        information_criteria: None,
                        residuals: Vec::new(),
                        decomposition: None,
                        error: Some(err.clone()),
                    }
                }
            };
            models.push(model);
        }

        let cv = match &self.config.cv {
            Some(cv_config) => {
                let results = cross_validate(series, registry, &fit_config, cv_config)?;
                tracing::info!(series = %key, folds = results.n_folds(), "cross-validation complete");
                report.record_cv(&key, &results);
                Some(results)
            }
            None => None,
        };

        Ok(PipelineOutput {
            series: key,
            transform,
            decomposition,
            models,
            cv,
            report,
            fits,
        })
    }

    fn evaluate_model(
        &self,
        key: &str,
        fitted: &FittedModel,
        test: Option<&TimeSeries>,
        horizon: usize,
        report: &mut AccuracyReport,
    ) -> ModelOutput {
        let name = fitted.name();
        report.record(key, name, Regime::Training, training_accuracy(fitted));

        let forecast = fitted.forecast(horizon);
        if let Some(test) = test {
            let metrics = forecast
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|fc| accuracy_with_scale(fc, test, fitted.training()));
            report.record(key, name, Regime::Test, metrics);
        }

        let diagnostics = match residual_diagnostics(fitted, self.config.lb_lags) {
            Ok(d) => Some(d),
            Err(err) => {
                tracing::warn!(series = key, model = name, error = %err, "residual diagnostics unavailable");
                None
            }
        };

        ModelOutput {
            name: name.to_string(),
            description: fitted.spec().describe(),
            error: forecast.as_ref().err().cloned(),
            forecast: forecast.ok(),
            diagnostics,
            information_criteria: fitted.information_criteria(),
            residuals: fitted.residuals().to_vec(),
            decomposition: fitted.decomposition().cloned(),
        }
    }

    /// Run every series in `store` in parallel.
    pub fn run_store(&self, store: &SeriesStore, registry: &ModelRegistry) -> StoreOutput {
        let entries: Vec<(&str, &TimeSeries)> = store.iter().collect();
        let outputs: Vec<(String, Result<PipelineOutput>)> = entries
            .par_iter()
            .map(|&(name, series)| {
                let output = self.run(series, registry);
                if let Err(err) = &output {
                    tracing::warn!(series = name, error = %err, "series skipped");
                }
                (name.to_string(), output)
            })
            .collect();

        let mut report = AccuracyReport::new();
        for output in outputs.iter().filter_map(|(_, o)| o.as_ref().ok()) {
            report.merge(output.report.clone());
        }
        tracing::info!(series = outputs.len(), rows = report.len(), "store evaluated");

        StoreOutput { outputs, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use crate::models::{BenchmarkMethod, EtsSpec, ModelSpec};
    use chrono::NaiveDate;

    fn quarterly(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let pattern = [1.1, 0.95, 0.85, 1.1];
        let values = (0..n)
            .map(|i| (50.0 + 1.2 * i as f64) * pattern[i % 4] + if i % 5 == 0 { 0.7 } else { -0.2 })
            .collect();
        TimeSeries::from_start(start, Frequency::Quarterly, values)
            .unwrap()
            .with_key("retail")
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with("snaive", ModelSpec::benchmark(BenchmarkMethod::SeasonalNaive))
            .unwrap()
            .with("holt", ModelSpec::ets(EtsSpec::aan()))
            .unwrap()
            .with(
                "stl_holt",
                ModelSpec::composite(
                    DecompositionMethod::default(),
                    DecompositionKind::Additive,
                    ModelSpec::ets(EtsSpec::aan()),
                ),
            )
            .unwrap()
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(PipelineConfig::from_json_str(r#"{"level": 1.5}"#).is_err());
    }

    #[test]
    fn run_reports_every_model_and_regime() {
        let config = PipelineConfig::default()
            .with_test_len(8)
            .with_transform(TransformChoice::Fixed(TransformSpec::Log))
            .with_decomposition(DecompositionMethod::default(), DecompositionKind::Additive);
        let output = Pipeline::new(config).run(&quarterly(48), &registry()).unwrap();

        assert_eq!(output.series, "retail");
        assert_eq!(output.models.len(), 3);
        assert_eq!(output.report.len(), 6);
        assert!(output.decomposition.is_some());
        for model in &output.models {
            let fc = model.forecast.as_ref().unwrap();
            assert_eq!(fc.horizon(), 8);
            assert_eq!(fc.timestamps()[0], NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        }
        assert!(output
            .report
            .find("retail", "holt", Regime::Test)
            .unwrap()
            .outcome
            .metrics()
            .is_some());
    }

    #[test]
    fn model_outputs_carry_residuals_and_composite_decomposition() {
        let config = PipelineConfig::default()
            .with_test_len(8)
            .with_transform(TransformChoice::Fixed(TransformSpec::Log));
        let output = Pipeline::new(config).run(&quarterly(48), &registry()).unwrap();

        let composite = output.model("stl_holt").unwrap();
        let decomposition = composite.decomposition.as_ref().unwrap();
        assert_eq!(decomposition.len(), 40);
        assert_eq!(decomposition.method, "stl");
        assert_eq!(composite.residuals.len(), 40);

        let snaive = output.model("snaive").unwrap();
        assert!(snaive.decomposition.is_none());
        assert_eq!(snaive.residuals.len(), 40);
        assert!(snaive.residuals[..4].iter().all(|r| r.is_nan()));
        assert!(snaive.residuals[4..].iter().all(|r| r.is_finite()));

        let json = serde_json::to_value(&output.models).unwrap();
        assert!(json[2]["decomposition"]["seasonal"].is_array());
        assert!(json[0]["residuals"][0].is_null());
        assert!(json[0]["residuals"][4].is_number());
    }

    #[test]
    fn run_with_cv_adds_rows() {
        let config = PipelineConfig::default().with_cv(CVConfig::expanding(24, 4).with_step_size(4));
        let output = Pipeline::new(config).run(&quarterly(40), &registry()).unwrap();
        let cv = output.cv.as_ref().unwrap();
        assert_eq!(cv.n_folds(), 4);
        let row = output
            .report
            .find("retail", "snaive", Regime::CrossValidation)
            .unwrap();
        assert!(row.outcome.metrics().is_some());
    }

    #[test]
    fn estimated_transform_is_box_cox() {
        let config = PipelineConfig::default().with_transform(TransformChoice::Estimate(LambdaMethod::Guerrero));
        let output = Pipeline::new(config).run(&quarterly(32), &registry()).unwrap();
        assert!(matches!(output.transform, TransformSpec::BoxCox { .. }));
    }

    #[test]
    fn run_store_keeps_going_after_a_bad_series() {
        let mut store = SeriesStore::new();
        store.insert("good", quarterly(32)).unwrap();
        store.insert("short", quarterly(6)).unwrap();
        let config = PipelineConfig::default().with_test_len(4);
        let out = Pipeline::new(config).run_store(&store, &registry());

        assert_eq!(out.outputs.len(), 2);
        let good = &out.outputs.iter().find(|(n, _)| n == "good").unwrap().1;
        assert!(good.is_ok());
        // The short series still runs; its seasonal models fail individually.
        let short = out.outputs.iter().find(|(n, _)| n == "short").unwrap().1.as_ref().unwrap();
        assert!(short.model("stl_holt").unwrap().error.is_some());
        assert!(out.report.failures().any(|r| r.series == "short"));
    }
}
