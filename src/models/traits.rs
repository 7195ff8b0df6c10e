//! Forecaster trait and the registry of named model specifications.

use super::spec::ModelSpec;
use crate::core::{Forecast, TimeSeries};
use crate::decomposition::Decomposition;
use crate::error::{ForecastError, Result};
use serde::Serialize;

/// Common interface for fitted model cores.
///
/// Forecasters work on whatever scale they are given; transforms and
/// decompositions are layered on top by [`FittedModel`](super::FittedModel).
pub trait Forecaster: Send + Sync {
    /// Fit the model to the time series data.
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Generate predictions with prediction intervals at `level`.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast>;

    /// Get the fitted values (one-step in-sample predictions). `NaN` where
    /// the method defines none.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Get the innovation residuals, one per training observation.
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Information criteria, for likelihood-based models.
    fn information_criteria(&self) -> Option<InformationCriteria> {
        None
    }

    /// Number of estimated parameters, used as the degrees-of-freedom
    /// correction in residual tests.
    fn num_parameters(&self) -> usize {
        0
    }

    /// Decomposition of the training series, for decomposition-based models.
    fn decomposition(&self) -> Option<&Decomposition> {
        None
    }

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
pub type BoxedForecaster = Box<dyn Forecaster>;

/// Likelihood-based model selection criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InformationCriteria {
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
}

/// Ordered collection of uniquely named model specifications.
///
/// # Example
///
/// ```
/// use forecast_pipeline::models::{BenchmarkMethod, EtsSpec, ModelRegistry, ModelSpec};
///
/// let mut registry = ModelRegistry::new();
/// registry.register("ses", ModelSpec::ets(EtsSpec::ann())).unwrap();
/// registry.register("naive", ModelSpec::benchmark(BenchmarkMethod::Naive)).unwrap();
/// assert!(registry.register("ses", ModelSpec::ets(EtsSpec::aan())).is_err());
/// assert_eq!(registry.names(), vec!["ses", "naive"]);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelRegistry {
    models: Vec<(String, ModelSpec)>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named model specification.
    ///
    /// Fails on an empty or duplicate name, or on a structurally invalid spec.
    pub fn register(&mut self, name: impl Into<String>, spec: ModelSpec) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ForecastError::InvalidParameter(
                "model name must not be empty".to_string(),
            ));
        }
        if self.get(&name).is_some() {
            return Err(ForecastError::InvalidParameter(format!(
                "model '{}' is already registered",
                name
            )));
        }
        spec.validate()?;
        self.models.push((name, spec));
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, name: impl Into<String>, spec: ModelSpec) -> Result<Self> {
        self.register(name, spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    /// Get the number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Iterate over `(name, spec)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelSpec)> {
        self.models.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|(n, _)| n.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{DecompositionKind, DecompositionMethod};
    use crate::models::{BenchmarkMethod, EtsSpec};

    #[test]
    fn registry_keeps_registration_order() {
        let registry = ModelRegistry::new()
            .with("b", ModelSpec::benchmark(BenchmarkMethod::Mean))
            .unwrap()
            .with("a", ModelSpec::ets(EtsSpec::ann()))
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn registry_rejects_duplicate_and_empty_names() {
        let mut registry = ModelRegistry::new();
        registry
            .register("naive", ModelSpec::benchmark(BenchmarkMethod::Naive))
            .unwrap();
        assert!(matches!(
            registry.register("naive", ModelSpec::benchmark(BenchmarkMethod::Drift)),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(matches!(
            registry.register("  ", ModelSpec::benchmark(BenchmarkMethod::Drift)),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_rejects_nested_composites() {
        let inner = ModelSpec::composite(
            DecompositionMethod::default(),
            DecompositionKind::Additive,
            ModelSpec::ets(EtsSpec::ann()),
        );
        let nested = ModelSpec::composite(
            DecompositionMethod::default(),
            DecompositionKind::Additive,
            inner,
        );
        let mut registry = ModelRegistry::new();
        assert!(registry.register("nested", nested).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_default_is_empty() {
        let registry = ModelRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
