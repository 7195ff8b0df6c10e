//! Error types for the forecast-pipeline library.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while transforming, decomposing, fitting or
/// evaluating a series.
///
/// `Range`, `IrregularSeries`, `Domain` and `InsufficientData` describe a
/// malformed request. `NonConvergence` describes a fit that ran out of budget
/// and is recorded per model rather than aborting sibling work.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// A time range or slice is invalid for the series.
    #[error("range error: {0}")]
    Range(String),

    /// Timestamps are not evenly spaced at the declared frequency.
    #[error("irregular series: {0}")]
    IrregularSeries(String),

    /// A transform or model component is undefined for the given values.
    #[error("domain error: {0}")]
    Domain(String),

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The optimizer did not converge within its budget.
    #[error("optimizer did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl ForecastError {
    /// True for errors that describe a malformed request rather than a
    /// fitting problem.
    pub fn is_data_validity(&self) -> bool {
        matches!(
            self,
            ForecastError::Range(_)
                | ForecastError::IrregularSeries(_)
                | ForecastError::Domain(_)
                | ForecastError::InsufficientData { .. }
        )
    }
}
