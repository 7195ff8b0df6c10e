//! Accuracy report assembled from fits, holdout evaluation and
//! cross-validation.
//!
//! Every model appears in the report for every regime it was evaluated in,
//! with either its metrics or the reason it failed.

use crate::error::{ForecastError, Result};
use crate::utils::cross_validation::{CVResults, FoldFailure};
use crate::utils::metrics::AccuracyMetrics;
use serde::Serialize;
use std::cmp::Ordering;

/// Evaluation regime of a report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// In-sample fitted values against the training data.
    Training,
    /// Forecasts against held-out observations.
    Test,
    /// Mean over rolling-origin folds.
    CrossValidation,
}

/// Fold bookkeeping for cross-validation rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FoldFailure>,
}

/// Metrics, or the reason none could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok {
        metrics: AccuracyMetrics,
        #[serde(skip_serializing_if = "Option::is_none")]
        folds: Option<FoldSummary>,
    },
    Failed {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        folds: Option<FoldSummary>,
    },
}

impl Outcome {
    pub fn metrics(&self) -> Option<&AccuracyMetrics> {
        match self {
            Outcome::Ok { metrics, .. } => Some(metrics),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

impl From<Result<AccuracyMetrics>> for Outcome {
    fn from(result: Result<AccuracyMetrics>) -> Self {
        match result {
            Ok(metrics) => Outcome::Ok {
                metrics,
                folds: None,
            },
            Err(err) => Outcome::Failed {
                reason: err.to_string(),
                folds: None,
            },
        }
    }
}

/// One (series, model, regime) entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub series: String,
    pub model: String,
    pub regime: Regime,
    pub outcome: Outcome,
}

/// Per-model, per-regime accuracy across one or more series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccuracyReport {
    rows: Vec<ReportRow>,
}

impl AccuracyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, series: &str, model: &str, regime: Regime, outcome: Outcome) {
        self.rows.push(ReportRow {
            series: series.to_string(),
            model: model.to_string(),
            regime,
            outcome,
        });
    }

    /// Record a metrics computation, successful or not.
    pub fn record(&mut self, series: &str, model: &str, regime: Regime, result: Result<AccuracyMetrics>) {
        self.push(series, model, regime, Outcome::from(result));
    }

    /// Add one cross-validation row per model.
    pub fn record_cv(&mut self, series: &str, results: &CVResults) {
        for model in &results.models {
            let folds = Some(FoldSummary {
                succeeded: model.folds_succeeded(),
                failed: model.folds_failed(),
                failures: model.failures.clone(),
            });
            let outcome = match model.mean {
                Some(metrics) => Outcome::Ok { metrics, folds },
                None => Outcome::Failed {
                    reason: cv_failure_reason(&model.failures),
                    folds,
                },
            };
            self.push(series, &model.name, Regime::CrossValidation, outcome);
        }
    }

    /// Append all rows of `other`.
    pub fn merge(&mut self, other: AccuracyReport) {
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose outcome is a failure.
    pub fn failures(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn find(&self, series: &str, model: &str, regime: Regime) -> Option<&ReportRow> {
        self.rows
            .iter()
            .find(|r| r.series == series && r.model == model && r.regime == regime)
    }

    /// Successful rows for `series` in `regime`, best RMSE first.
    pub fn ranking(&self, series: &str, regime: Regime) -> Vec<&ReportRow> {
        let mut rows: Vec<&ReportRow> = self
            .rows
            .iter()
            .filter(|r| r.series == series && r.regime == regime)
            .filter(|r| r.outcome.metrics().is_some_and(|m| m.rmse.is_finite()))
            .collect();
        rows.sort_by(|a, b| {
            let rmse = |r: &ReportRow| r.outcome.metrics().map_or(f64::INFINITY, |m| m.rmse);
            rmse(a).partial_cmp(&rmse(b)).unwrap_or(Ordering::Equal)
        });
        rows
    }

    /// Serialise to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ForecastError::ComputationError(format!("report serialisation: {}", e)))
    }
}

fn cv_failure_reason(failures: &[FoldFailure]) -> String {
    match failures.first() {
        Some(first) => format!("all {} folds failed; first: {}", failures.len(), first.error),
        None => "no folds evaluated".to_string(),
    }
}
