//! Rolling-origin cross-validation over a model registry.
//!
//! Training windows always start at the first observation and grow by
//! `step_size` per fold. Every (fold, model) pair is fitted from scratch and
//! the pairs run in parallel.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{validate_series, FitConfig, FittedModel, ModelRegistry, ModelSpec};
use crate::transform::TransformSpec;
use crate::utils::metrics::{accuracy_with_scale, AccuracyMetrics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for time series cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CVConfig {
    /// Length of the first training window.
    pub initial_window: usize,
    /// Observations added to the training window per fold.
    pub step_size: usize,
    /// Forecast horizon for each fold.
    pub horizon: usize,
    /// Keep trailing folds with fewer than `horizon` actuals.
    pub allow_partial: bool,
}

impl Default for CVConfig {
    fn default() -> Self {
        Self {
            initial_window: 10,
            step_size: 1,
            horizon: 1,
            allow_partial: false,
        }
    }
}

/// Training prefix `[0, train_end)` evaluated on `[train_end, test_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub index: usize,
    pub train_end: usize,
    pub test_end: usize,
}

impl Fold {
    pub fn test_len(&self) -> usize {
        self.test_end - self.train_end
    }
}

impl CVConfig {
    /// Expanding-window configuration with a step of one.
    pub fn expanding(initial_window: usize, horizon: usize) -> Self {
        Self {
            initial_window,
            horizon,
            ..Self::default()
        }
    }

    /// Set the step size between folds.
    pub fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = step_size;
        self
    }

    /// Include truncated folds at the end of the series.
    pub fn with_partial_folds(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Folds for a series of length `n`.
    ///
    /// Without partial folds there are `(n - initial_window - horizon) /
    /// step_size + 1` of them.
    pub fn folds(&self, n: usize) -> Result<Vec<Fold>> {
        if self.initial_window == 0 || self.step_size == 0 || self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "initial window, step size and horizon must be positive".to_string(),
            ));
        }
        let needed = self.initial_window + if self.allow_partial { 1 } else { self.horizon };
        if n < needed {
            return Err(ForecastError::InsufficientData { needed, got: n });
        }

        let folds = (0..)
            .map(|k| self.initial_window + k * self.step_size)
            .take_while(|&origin| {
                if self.allow_partial {
                    origin < n
                } else {
                    origin + self.horizon <= n
                }
            })
            .enumerate()
            .map(|(index, train_end)| Fold {
                index,
                train_end,
                test_end: (train_end + self.horizon).min(n),
            })
            .collect();
        Ok(folds)
    }
}

/// A fold in which a model failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldFailure {
    pub fold: usize,
    pub error: ForecastError,
}

/// Cross-validation summary for one model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCV {
    pub name: String,
    /// Mean of each metric over successful folds.
    pub mean: Option<AccuracyMetrics>,
    /// Per-fold metrics of the successful folds, as `(fold, metrics)`.
    pub fold_metrics: Vec<(usize, AccuracyMetrics)>,
    /// RMSE at each forecast step across successful folds.
    pub horizon_rmse: Vec<f64>,
    pub failures: Vec<FoldFailure>,
}

impl ModelCV {
    pub fn folds_succeeded(&self) -> usize {
        self.fold_metrics.len()
    }

    pub fn folds_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Results of cross-validating a registry.
#[derive(Debug, Clone, Serialize)]
pub struct CVResults {
    pub folds: Vec<Fold>,
    /// One entry per registered model, in registration order.
    pub models: Vec<ModelCV>,
}

impl CVResults {
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn get(&self, name: &str) -> Option<&ModelCV> {
        self.models.iter().find(|m| m.name == name)
    }
}

struct FoldOutcome {
    metrics: AccuracyMetrics,
    errors: Vec<f64>,
}

fn evaluate_fold(
    series: &TimeSeries,
    fold: &Fold,
    name: &str,
    spec: &ModelSpec,
    config: &FitConfig,
) -> Result<FoldOutcome> {
    let train = series.head(fold.train_end)?;
    let actuals = series.slice_index(fold.train_end, fold.test_end)?;
    let model = FittedModel::fit(name, &train, spec, config)?;
    let forecast = model.forecast(fold.test_len())?;
    let metrics = accuracy_with_scale(&forecast, &actuals, &train)?;
    let errors = actuals
        .values()
        .iter()
        .zip(forecast.point())
        .map(|(a, p)| a - p)
        .collect();
    Ok(FoldOutcome { metrics, errors })
}

/// Cross-validate every model in `registry` on `series`.
///
/// A transform in `config` is used as-is in every fold; estimate it once on
/// the full series beforehand. Problems with the series or the fold layout
/// are returned as errors; model failures are recorded per fold.
///
/// # Example
/// ```
/// use forecast_pipeline::core::{Frequency, TimeSeries};
/// use forecast_pipeline::models::{BenchmarkMethod, FitConfig, ModelRegistry, ModelSpec};
/// use forecast_pipeline::utils::cross_validation::{cross_validate, CVConfig};
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
/// let values: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
/// let series = TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap();
/// let registry = ModelRegistry::new()
///     .with("naive", ModelSpec::benchmark(BenchmarkMethod::Naive))
///     .unwrap();
///
/// let config = CVConfig::expanding(20, 4).with_step_size(2);
/// let results = cross_validate(&series, &registry, &FitConfig::default(), &config).unwrap();
///
/// assert_eq!(results.n_folds(), 9);
/// assert_eq!(results.get("naive").unwrap().folds_succeeded(), 9);
/// ```
pub fn cross_validate(
    series: &TimeSeries,
    registry: &ModelRegistry,
    fit_config: &FitConfig,
    cv_config: &CVConfig,
) -> Result<CVResults> {
    validate_series(series, &fit_config.transform.unwrap_or(TransformSpec::Identity))?;
    let folds = cv_config.folds(series.len())?;
    let specs: Vec<(&str, &ModelSpec)> = registry.iter().collect();

    let tasks: Vec<(usize, &Fold)> = (0..specs.len())
        .flat_map(|m| folds.iter().map(move |fold| (m, fold)))
        .collect();

    let outcomes: Vec<(usize, usize, Result<FoldOutcome>)> = tasks
        .par_iter()
        .map(|&(m, fold)| {
            let (name, spec) = specs[m];
            let outcome = evaluate_fold(series, fold, name, spec, fit_config);
            match &outcome {
                Ok(o) => tracing::debug!(
                    model = name,
                    fold = fold.index,
                    train_len = fold.train_end,
                    rmse = o.metrics.rmse,
                    "fold evaluated"
                ),
                Err(err) => tracing::warn!(
                    model = name,
                    fold = fold.index,
                    error = %err,
                    "fold failed"
                ),
            }
            (m, fold.index, outcome)
        })
        .collect();

    let mut models: Vec<ModelCV> = specs
        .iter()
        .map(|(name, _)| ModelCV {
            name: name.to_string(),
            mean: None,
            fold_metrics: Vec::new(),
            horizon_rmse: Vec::new(),
            failures: Vec::new(),
        })
        .collect();
    let mut squared: Vec<Vec<(f64, usize)>> = vec![vec![(0.0, 0); cv_config.horizon]; specs.len()];

    for (m, fold, outcome) in outcomes {
        match outcome {
            Ok(FoldOutcome { metrics, errors }) => {
                for (slot, e) in squared[m].iter_mut().zip(&errors) {
                    slot.0 += e * e;
                    slot.1 += 1;
                }
                models[m].fold_metrics.push((fold, metrics));
            }
            Err(error) => models[m].failures.push(FoldFailure { fold, error }),
        }
    }

    for (model, sq) in models.iter_mut().zip(squared) {
        let metrics: Vec<AccuracyMetrics> = model.fold_metrics.iter().map(|(_, m)| *m).collect();
        model.mean = AccuracyMetrics::mean_of(&metrics);
        model.horizon_rmse = sq
            .into_iter()
            .map(|(sum, count)| {
                if count == 0 {
                    f64::NAN
                } else {
                    (sum / count as f64).sqrt()
                }
            })
            .collect();
    }

    Ok(CVResults { folds, models })
}
