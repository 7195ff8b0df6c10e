//! Evaluation, optimisation and statistics helpers.

pub mod cross_validation;
pub mod metrics;
pub mod optimization;
pub mod stats;

pub use cross_validation::{cross_validate, CVConfig, CVResults, Fold, FoldFailure, ModelCV};
pub use metrics::{
    accuracy, accuracy_with_scale, calculate_metrics, training_accuracy, AccuracyMetrics,
    TrainingScale,
};
pub use optimization::{brent_minimize, nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{interval_z, quantile_normal};
