//! Forecasting models.

mod benchmark;
mod composite;
mod ets;
mod fitted;
mod spec;
mod traits;

pub use benchmark::Benchmark;
pub use composite::CompositeModel;
pub use ets::{Ets, EtsParams};
pub use fitted::{build_forecaster, fit, FitConfig, FittedModel, ModelFits};
pub(crate) use fitted::validate_series;
pub use spec::{
    BenchmarkMethod, ErrorType, EtsSpec, ModelSpec, OptimizerBudget, SeasonalType, TrendType,
};
pub use traits::{BoxedForecaster, Forecaster, InformationCriteria, ModelRegistry};
