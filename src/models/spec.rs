//! Structural model specifications.
//!
//! A [`ModelSpec`] is plain data: it says which model to fit, never holds
//! fitted state, and can be fitted any number of times.

use crate::decomposition::{DecompositionKind, DecompositionMethod};
use crate::error::{ForecastError, Result};
use crate::utils::optimization::NelderMeadConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[default]
    Additive,
    Multiplicative,
}

/// Trend component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendType {
    #[default]
    None,
    Additive,
    AdditiveDamped,
}

/// Seasonal component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalType {
    #[default]
    None,
    Additive,
    Multiplicative,
}

/// ETS model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EtsSpec {
    pub error: ErrorType,
    pub trend: TrendType,
    pub seasonal: SeasonalType,
}

impl EtsSpec {
    pub fn new(error: ErrorType, trend: TrendType, seasonal: SeasonalType) -> Self {
        Self {
            error,
            trend,
            seasonal,
        }
    }

    /// ETS(A,N,N) - simple exponential smoothing.
    pub fn ann() -> Self {
        Self::new(ErrorType::Additive, TrendType::None, SeasonalType::None)
    }

    /// ETS(A,A,N) - Holt's linear method.
    pub fn aan() -> Self {
        Self::new(ErrorType::Additive, TrendType::Additive, SeasonalType::None)
    }

    /// ETS(A,Ad,N) - damped trend.
    pub fn aadn() -> Self {
        Self::new(ErrorType::Additive, TrendType::AdditiveDamped, SeasonalType::None)
    }

    /// ETS(A,N,A).
    pub fn ana() -> Self {
        Self::new(ErrorType::Additive, TrendType::None, SeasonalType::Additive)
    }

    /// ETS(A,A,A) - additive Holt-Winters.
    pub fn aaa() -> Self {
        Self::new(ErrorType::Additive, TrendType::Additive, SeasonalType::Additive)
    }

    /// ETS(M,N,N).
    pub fn mnn() -> Self {
        Self::new(ErrorType::Multiplicative, TrendType::None, SeasonalType::None)
    }

    /// ETS(M,A,M) - multiplicative Holt-Winters.
    pub fn mam() -> Self {
        Self::new(
            ErrorType::Multiplicative,
            TrendType::Additive,
            SeasonalType::Multiplicative,
        )
    }

    /// ETS(M,Ad,M).
    pub fn madm() -> Self {
        Self::new(
            ErrorType::Multiplicative,
            TrendType::AdditiveDamped,
            SeasonalType::Multiplicative,
        )
    }

    /// Short name such as `ETS(A,Ad,M)`.
    pub fn short_name(&self) -> String {
        let e = match self.error {
            ErrorType::Additive => "A",
            ErrorType::Multiplicative => "M",
        };
        let t = match self.trend {
            TrendType::None => "N",
            TrendType::Additive => "A",
            TrendType::AdditiveDamped => "Ad",
        };
        let s = match self.seasonal {
            SeasonalType::None => "N",
            SeasonalType::Additive => "A",
            SeasonalType::Multiplicative => "M",
        };
        format!("ETS({},{},{})", e, t, s)
    }

    pub fn has_trend(&self) -> bool {
        !matches!(self.trend, TrendType::None)
    }

    pub fn has_seasonal(&self) -> bool {
        !matches!(self.seasonal, SeasonalType::None)
    }

    pub fn is_damped(&self) -> bool {
        matches!(self.trend, TrendType::AdditiveDamped)
    }

    /// True when a component is only defined for positive data.
    pub fn requires_positive(&self) -> bool {
        self.error == ErrorType::Multiplicative || self.seasonal == SeasonalType::Multiplicative
    }
}

/// Iteration and wall-clock limits for parameter optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerBudget {
    pub max_iter: usize,
    /// Optional wall-clock limit in milliseconds.
    pub time_limit_ms: Option<u64>,
}

impl Default for OptimizerBudget {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            time_limit_ms: None,
        }
    }
}

impl OptimizerBudget {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(limit.as_millis() as u64);
        self
    }

    pub(crate) fn nelder_mead_config(&self) -> NelderMeadConfig {
        let config = NelderMeadConfig::default().with_max_iter(self.max_iter);
        match self.time_limit_ms {
            Some(ms) => config.with_time_budget(Duration::from_millis(ms)),
            None => config,
        }
    }
}

/// Simple benchmark forecasting methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkMethod {
    /// Historical mean.
    Mean,
    /// Last observation.
    Naive,
    /// Last observation from the same season.
    SeasonalNaive,
    /// Last observation plus the average change.
    Drift,
}

impl fmt::Display for BenchmarkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BenchmarkMethod::Mean => "MEAN",
            BenchmarkMethod::Naive => "NAIVE",
            BenchmarkMethod::SeasonalNaive => "SNAIVE",
            BenchmarkMethod::Drift => "DRIFT",
        };
        f.write_str(name)
    }
}

/// A model to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    /// Exponential smoothing state-space model. `budget` overrides the
    /// fit-wide optimiser budget.
    Ets {
        spec: EtsSpec,
        budget: Option<OptimizerBudget>,
    },
    Benchmark(BenchmarkMethod),
    /// Decompose, fit `sub` on the seasonally adjusted series and add the
    /// seasonal component back to the forecasts.
    Composite {
        method: DecompositionMethod,
        kind: DecompositionKind,
        sub: Box<ModelSpec>,
    },
}

impl ModelSpec {
    pub fn ets(spec: EtsSpec) -> Self {
        ModelSpec::Ets { spec, budget: None }
    }

    pub fn ets_with_budget(spec: EtsSpec, budget: OptimizerBudget) -> Self {
        ModelSpec::Ets {
            spec,
            budget: Some(budget),
        }
    }

    pub fn benchmark(method: BenchmarkMethod) -> Self {
        ModelSpec::Benchmark(method)
    }

    pub fn composite(method: DecompositionMethod, kind: DecompositionKind, sub: ModelSpec) -> Self {
        ModelSpec::Composite {
            method,
            kind,
            sub: Box::new(sub),
        }
    }

    /// Reject structurally invalid specs. Composites may not nest.
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelSpec::Composite { sub, .. } => match sub.as_ref() {
                ModelSpec::Composite { .. } => Err(ForecastError::InvalidParameter(
                    "composite models cannot be nested".to_string(),
                )),
                other => other.validate(),
            },
            _ => Ok(()),
        }
    }

    /// Human-readable description, e.g. `STL(additive) + ETS(A,A,N)`.
    pub fn describe(&self) -> String {
        match self {
            ModelSpec::Ets { spec, .. } => spec.short_name(),
            ModelSpec::Benchmark(method) => method.to_string(),
            ModelSpec::Composite { method, kind, sub } => {
                let kind = match kind {
                    DecompositionKind::Additive => "additive",
                    DecompositionKind::Multiplicative => "multiplicative",
                };
                format!("{}({}) + {}", method.name().to_uppercase(), kind, sub.describe())
            }
        }
    }
}
