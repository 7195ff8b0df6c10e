//! Residual diagnostics.
//!
//! # Example
//!
//! ```
//! use forecast_pipeline::validation::{default_lags, ljung_box};
//!
//! let residuals: Vec<f64> = (0..40).map(|i| if i % 3 == 0 { 0.4 } else { -0.2 }).collect();
//! let result = ljung_box(&residuals, default_lags(residuals.len(), 4), 0).unwrap();
//! assert_eq!(result.lags, 8);
//! ```


pub use residual_tests::{
    default_lags, ljung_box, residual_diagnostics, LjungBoxResult, ResidualDiagnostics,
};
