//! # forecast-pipeline
//!
//! Transform selection, seasonal decomposition, exponential smoothing and
//! forecast evaluation for regular annual, quarterly and monthly series.
//!
//! The flow for one series is: validate the index, pick a variance
//! stabilising transform, optionally decompose, fit a registry of models
//! in parallel, and evaluate them in-sample, on a holdout and with
//! rolling-origin cross-validation. Model failures are recorded next to
//! successful results instead of aborting the run.
//!
//! # Example
//!
//! ```
//! use forecast_pipeline::prelude::*;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
//! let values: Vec<f64> = (0..40)
//!     .map(|i| 100.0 + 2.0 * i as f64 + [5.0, -3.0, -6.0, 4.0][i % 4])
//!     .collect();
//! let series = TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap();
//!
//! let registry = ModelRegistry::new()
//!     .with("snaive", ModelSpec::benchmark(BenchmarkMethod::SeasonalNaive))
//!     .unwrap()
//!     .with("holt_winters", ModelSpec::ets(EtsSpec::aaa()))
//!     .unwrap();
//!
//! let config = PipelineConfig::default().with_test_len(8);
//! let output = Pipeline::new(config).run(&series, &registry).unwrap();
//!
//! assert_eq!(output.models.len(), 2);
//! assert!(output.report.to_json().unwrap().contains("snaive"));
//! ```

pub mod core;
pub mod decomposition;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod transform;
pub mod utils;
pub mod validation;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{Forecast, Frequency, SeriesStore, TimeSeries};
    pub use crate::decomposition::{decompose, DecompositionKind, DecompositionMethod};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::{
        fit, BenchmarkMethod, EtsSpec, FitConfig, FittedModel, Forecaster, ModelRegistry, ModelSpec,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, TransformChoice};
    pub use crate::report::{AccuracyReport, Regime};
    pub use crate::transform::{estimate_lambda, LambdaMethod, TransformSpec};
    pub use crate::utils::{accuracy, cross_validate, AccuracyMetrics, CVConfig};
}
