//! Seasonal decomposition of time series.
//!
//! A series is split into trend, seasonal and remainder components, either
//! additively (`y = T + S + R`) or multiplicatively (`y = T * S * R`). Two
//! strategies are available behind the [`Decomposer`] trait:
//!
//! - [`StlConfig`]: local regression (loess) smoothing of cycle-subseries and trend
//! - [`X11Config`]: moving averages with a Henderson trend pass
//!
//! Annual series have no seasonal cycle; their seasonal component is the
//! identity element of the decomposition and only trend and remainder are
//! estimated.

mod stl;
mod x11;

pub use stl::{SeasonalWindow, StlConfig};
pub use x11::{henderson_weights, X11Config};

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::utils::stats::variance;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How components combine into the observed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionKind {
    #[default]
    Additive,
    Multiplicative,
}

impl DecompositionKind {
    /// Neutral element: 0 for additive, 1 for multiplicative.
    pub fn identity(&self) -> f64 {
        match self {
            DecompositionKind::Additive => 0.0,
            DecompositionKind::Multiplicative => 1.0,
        }
    }

    /// Combine two components.
    #[inline]
    pub fn combine(&self, a: f64, b: f64) -> f64 {
        match self {
            DecompositionKind::Additive => a + b,
            DecompositionKind::Multiplicative => a * b,
        }
    }

    /// Remove component `b` from `a`.
    #[inline]
    pub fn remove(&self, a: f64, b: f64) -> f64 {
        match self {
            DecompositionKind::Additive => a - b,
            DecompositionKind::Multiplicative => a / b,
        }
    }
}

/// Result of a decomposition. All component vectors share the input index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub timestamps: Vec<NaiveDate>,
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
    pub kind: DecompositionKind,
    pub period: usize,
    pub method: String,
}

impl Decomposition {
    /// Assemble a decomposition, deriving the remainder from the other
    /// components so that reconstruction is exact.
    pub(crate) fn from_components(
        series: &TimeSeries,
        trend: Vec<f64>,
        seasonal: Vec<f64>,
        kind: DecompositionKind,
        method: &str,
    ) -> Self {
        let observed = series.values().to_vec();
        let remainder = observed
            .iter()
            .zip(&trend)
            .zip(&seasonal)
            .map(|((&y, &t), &s)| kind.remove(kind.remove(y, t), s))
            .collect();

        Self {
            timestamps: series.timestamps().to_vec(),
            observed,
            trend,
            seasonal,
            remainder,
            kind,
            period: series.period(),
            method: method.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Observed series with the seasonal component removed.
    pub fn seasonally_adjusted(&self) -> Vec<f64> {
        self.observed
            .iter()
            .zip(&self.seasonal)
            .map(|(&y, &s)| self.kind.remove(y, s))
            .collect()
    }

    /// Recombine trend, seasonal and remainder.
    pub fn reconstruct(&self) -> Vec<f64> {
        self.trend
            .iter()
            .zip(&self.seasonal)
            .zip(&self.remainder)
            .map(|((&t, &s), &r)| self.kind.combine(self.kind.combine(t, s), r))
            .collect()
    }

    /// Seasonal values for the `horizon` steps after the end of the series,
    /// repeating the last full cycle.
    pub fn extrapolate_seasonal(&self, horizon: usize) -> Vec<f64> {
        let n = self.len();
        let p = self.period.max(1);
        if n < p {
            return vec![self.kind.identity(); horizon];
        }
        let last_cycle = &self.seasonal[n - p..];
        (0..horizon).map(|j| last_cycle[j % p]).collect()
    }

    /// Strength of seasonality, `max(0, 1 - Var(R) / Var(S + R))`.
    ///
    /// Multiplicative components are compared on the log scale.
    pub fn seasonal_strength(&self) -> f64 {
        self.strength(&self.seasonal)
    }

    /// Strength of trend, `max(0, 1 - Var(R) / Var(T + R))`.
    pub fn trend_strength(&self) -> f64 {
        self.strength(&self.trend)
    }

    fn strength(&self, component: &[f64]) -> f64 {
        let to_additive = |v: f64| match self.kind {
            DecompositionKind::Additive => v,
            DecompositionKind::Multiplicative => v.ln(),
        };
        let remainder: Vec<f64> = self.remainder.iter().map(|&r| to_additive(r)).collect();
        let combined: Vec<f64> = component
            .iter()
            .zip(&remainder)
            .map(|(&c, &r)| to_additive(c) + r)
            .collect();

        let var_combined = variance(&combined);
        if !var_combined.is_finite() || var_combined < 1e-10 {
            return 0.0;
        }
        (1.0 - variance(&remainder) / var_combined).clamp(0.0, 1.0)
    }
}

/// Strategy that splits a series into components.
pub trait Decomposer {
    /// Decompose `series` with the requested combination rule.
    fn decompose(&self, series: &TimeSeries, kind: DecompositionKind) -> Result<Decomposition>;

    /// Short method name recorded in the result.
    fn name(&self) -> &'static str;
}

/// Closed set of decomposition strategies with their settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DecompositionMethod {
    Stl(StlConfig),
    X11(X11Config),
}

impl Default for DecompositionMethod {
    fn default() -> Self {
        DecompositionMethod::Stl(StlConfig::default())
    }
}

impl DecompositionMethod {
    pub fn decomposer(&self) -> &dyn Decomposer {
        match self {
            DecompositionMethod::Stl(config) => config as &dyn Decomposer,
            DecompositionMethod::X11(config) => config,
        }
    }

    pub fn name(&self) -> &'static str {
        self.decomposer().name()
    }
}

/// Decompose `series` with `method`.
pub fn decompose(
    series: &TimeSeries,
    method: &DecompositionMethod,
    kind: DecompositionKind,
) -> Result<Decomposition> {
    let result = method.decomposer().decompose(series, kind)?;
    tracing::debug!(
        method = method.name(),
        n = result.len(),
        period = result.period,
        seasonal_strength = result.seasonal_strength(),
        "series decomposed"
    );
    Ok(result)
}

/// Checks shared by every strategy: length, finiteness and, for
/// multiplicative requests, positivity.
pub(crate) fn validate_input(series: &TimeSeries, kind: DecompositionKind) -> Result<()> {
    if series.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    let needed = 2 * series.period();
    if series.len() < needed {
        return Err(ForecastError::InsufficientData {
            needed,
            got: series.len(),
        });
    }
    if series.has_missing_values() {
        return Err(ForecastError::Domain(
            "decomposition requires finite values".to_string(),
        ));
    }
    if kind == DecompositionKind::Multiplicative && !series.all_positive() {
        return Err(ForecastError::Domain(
            "multiplicative decomposition requires strictly positive values".to_string(),
        ));
    }
    Ok(())
}
