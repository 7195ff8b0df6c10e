//! Accuracy metrics for forecast evaluation.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::FittedModel;
use serde::Serialize;

/// Accuracy metrics for evaluating forecast performance.
///
/// Undefined metrics are `NaN` rather than errors, so they serialise as
/// `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    /// Mean Error
    pub me: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (NaN if any actual is zero)
    pub mape: f64,
    /// Mean Absolute Scaled Error (NaN without a training scale)
    pub mase: f64,
    /// Root Mean Squared Scaled Error (NaN without a training scale)
    pub rmsse: f64,
    /// Number of compared points.
    pub n: usize,
}

impl AccuracyMetrics {
    /// Simple mean of each metric across `metrics`; `n` is summed.
    pub fn mean_of(metrics: &[AccuracyMetrics]) -> Option<AccuracyMetrics> {
        if metrics.is_empty() {
            return None;
        }
        let k = metrics.len() as f64;
        let avg = |f: fn(&AccuracyMetrics) -> f64| metrics.iter().map(f).sum::<f64>() / k;
        Some(AccuracyMetrics {
            me: avg(|m| m.me),
            mae: avg(|m| m.mae),
            rmse: avg(|m| m.rmse),
            mape: avg(|m| m.mape),
            mase: avg(|m| m.mase),
            rmsse: avg(|m| m.rmsse),
            n: metrics.iter().map(|m| m.n).sum(),
        })
    }
}

/// In-sample seasonal naive errors used to scale MASE and RMSSE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingScale {
    pub mae: f64,
    pub mse: f64,
}

impl TrainingScale {
    /// Scale from one-season differences of `training`, falling back to
    /// first differences when the series is shorter than two seasons.
    pub fn from_training(training: &TimeSeries) -> Option<Self> {
        let values = training.values();
        let period = training.period();
        let lag = if values.len() > period { period } else { 1 };
        if values.len() <= lag {
            return None;
        }
        let diffs: Vec<f64> = values
            .iter()
            .skip(lag)
            .zip(values)
            .map(|(curr, prev)| curr - prev)
            .filter(|d| d.is_finite())
            .collect();
        if diffs.is_empty() {
            return None;
        }
        let k = diffs.len() as f64;
        Some(Self {
            mae: diffs.iter().map(|d| d.abs()).sum::<f64>() / k,
            mse: diffs.iter().map(|d| d * d).sum::<f64>() / k,
        })
    }
}

/// Calculate accuracy metrics between actual and predicted values.
///
/// Any non-finite prediction is a computation error naming the offending
/// steps (1-based). Pairs with a non-finite actual are skipped.
pub fn calculate_metrics(
    actual: &[f64],
    predicted: &[f64],
    scale: Option<&TrainingScale>,
) -> Result<AccuracyMetrics> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    let non_finite: Vec<usize> = predicted
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_finite())
        .map(|(i, _)| i + 1)
        .collect();
    if !non_finite.is_empty() {
        return Err(ForecastError::ComputationError(format!(
            "non-finite predictions at steps {:?}",
            non_finite
        )));
    }
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| (a, p))
        .filter(|(a, _)| a.is_finite())
        .collect();
    if pairs.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    let n = pairs.len() as f64;
    let me = pairs.iter().map(|(a, p)| a - p).sum::<f64>() / n;
    let mae = pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let mse = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n;

    // Undefined, not an error, when an actual is exactly zero.
    let mape = if pairs.iter().any(|(a, _)| *a == 0.0) {
        f64::NAN
    } else {
        100.0 * pairs.iter().map(|(a, p)| ((a - p) / a).abs()).sum::<f64>() / n
    };

    let (mase, rmsse) = match scale {
        Some(s) if s.mae > 0.0 && s.mse > 0.0 => (mae / s.mae, (mse / s.mse).sqrt()),
        _ => (f64::NAN, f64::NAN),
    };

    Ok(AccuracyMetrics {
        me,
        mae,
        rmse: mse.sqrt(),
        mape,
        mase,
        rmsse,
        n: pairs.len(),
    })
}

/// Point forecasts paired with actuals at the shared timestamps.
fn overlap(forecast: &Forecast, actuals: &TimeSeries) -> Result<(Vec<f64>, Vec<f64>)> {
    let (actual, predicted): (Vec<f64>, Vec<f64>) = forecast
        .rows()
        .filter_map(|row| {
            actuals
                .position(row.timestamp)
                .map(|i| (actuals.values()[i], row.point))
        })
        .unzip();
    if actual.is_empty() {
        return Err(ForecastError::Range(
            "forecast and actuals share no timestamps".to_string(),
        ));
    }
    Ok((actual, predicted))
}

/// Accuracy of `forecast` over the timestamps it shares with `actuals`.
///
/// # Example
/// ```
/// use forecast_pipeline::core::{Forecast, Frequency, TimeSeries};
/// use forecast_pipeline::utils::accuracy;
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let actuals = TimeSeries::from_start(start, Frequency::Annual, vec![10.0, 12.0]).unwrap();
/// let forecast = Forecast::new(
///     actuals.timestamps().to_vec(),
///     vec![11.0, 11.0],
///     vec![9.0, 9.0],
///     vec![13.0, 13.0],
///     0.95,
/// )
/// .unwrap();
///
/// let metrics = accuracy(&forecast, &actuals).unwrap();
/// assert_eq!(metrics.rmse, 1.0);
/// assert!(metrics.mase.is_nan());
/// ```
pub fn accuracy(forecast: &Forecast, actuals: &TimeSeries) -> Result<AccuracyMetrics> {
    let (actual, predicted) = overlap(forecast, actuals)?;
    calculate_metrics(&actual, &predicted, None)
}

/// Like [`accuracy`], adding MASE and RMSSE scaled by `training`.
pub fn accuracy_with_scale(
    forecast: &Forecast,
    actuals: &TimeSeries,
    training: &TimeSeries,
) -> Result<AccuracyMetrics> {
    let (actual, predicted) = overlap(forecast, actuals)?;
    let scale = TrainingScale::from_training(training);
    calculate_metrics(&actual, &predicted, scale.as_ref())
}

/// In-sample accuracy of a fitted model on the original scale.
///
/// Warm-up steps without a fitted value (`NaN`) are left out.
pub fn training_accuracy(fitted: &FittedModel) -> Result<AccuracyMetrics> {
    let training = fitted.training();
    let scale = TrainingScale::from_training(training);
    let (actual, predicted): (Vec<f64>, Vec<f64>) = training
        .values()
        .iter()
        .zip(fitted.fitted_values())
        .filter(|(_, p)| !p.is_nan())
        .map(|(&a, &p)| (a, p))
        .unzip();
    calculate_metrics(&actual, &predicted, scale.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn quarterly(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        TimeSeries::from_start(start, Frequency::Quarterly, values).unwrap()
    }

    fn forecast_for(series: &TimeSeries, point: Vec<f64>) -> Forecast {
        let n = point.len();
        Forecast::new(
            series.timestamps()[..n].to_vec(),
            point.clone(),
            point.iter().map(|p| p - 1.0).collect(),
            point.iter().map(|p| p + 1.0).collect(),
            0.95,
        )
        .unwrap()
    }

    #[test]
    fn basic_metrics() {
        let m = calculate_metrics(&[1.0, 2.0, 3.0, 4.0], &[1.5, 2.5, 2.5, 3.5], None).unwrap();
        assert_relative_eq!(m.me, 0.0, epsilon = 1e-12);
        assert_relative_eq!(m.mae, 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.rmse, 0.5, epsilon = 1e-12);
        assert_eq!(m.n, 4);
        assert!(m.mase.is_nan());
    }

    #[test]
    fn mape_is_nan_when_an_actual_is_zero() {
        let m = calculate_metrics(&[0.0, 2.0], &[1.0, 2.0], None).unwrap();
        assert!(m.mape.is_nan());
        assert!(m.rmse.is_finite());

        let m = calculate_metrics(&[4.0, 2.0], &[3.0, 2.5], None).unwrap();
        assert_relative_eq!(m.mape, 100.0 * (0.25 + 0.25) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_predictions_are_errors() {
        let result = calculate_metrics(&[1.0, 2.0, 3.0], &[2.0, f64::INFINITY, f64::NAN], None);
        match result {
            Err(ForecastError::ComputationError(msg)) => assert!(msg.contains("[2, 3]"), "{}", msg),
            other => panic!("expected computation error, got {:?}", other),
        }

        let m = calculate_metrics(&[1.0, f64::NAN, 3.0], &[1.5, 2.0, 4.0], None).unwrap();
        assert_eq!(m.n, 2);
        assert_relative_eq!(m.mae, 0.75);
    }

    #[test]
    fn training_accuracy_skips_warm_up() {
        use crate::models::{BenchmarkMethod, FitConfig, ModelSpec};

        let training = quarterly(vec![1.0, 2.0, 4.0, 7.0, 11.0]);
        let spec = ModelSpec::benchmark(BenchmarkMethod::Naive);
        let fitted = FittedModel::fit("naive", &training, &spec, &FitConfig::default()).unwrap();
        assert!(fitted.fitted_values()[0].is_nan());

        let m = training_accuracy(&fitted).unwrap();
        assert_eq!(m.n, 4);
        assert_relative_eq!(m.mae, (1.0 + 2.0 + 3.0 + 4.0) / 4.0);
    }

    #[test]
    fn exploding_back_transformed_forecast_is_not_scored() {
        use crate::models::{BenchmarkMethod, FitConfig, ModelSpec};
        use crate::transform::TransformSpec;

        let start = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let values: Vec<f64> = (0..30).map(|i| (0.3 * i as f64).exp()).collect();
        let series = TimeSeries::from_start(start, Frequency::Annual, values).unwrap();
        let (train, test) = series.train_test_split(10).unwrap();

        let config = FitConfig::default().with_transform(TransformSpec::BoxCox { lambda: -0.35 });
        let spec = ModelSpec::benchmark(BenchmarkMethod::Drift);
        let fitted = FittedModel::fit("drift", &train, &spec, &config).unwrap();
        let fc = fitted.forecast(10).unwrap();
        assert!(fc.point().iter().any(|p| p.is_infinite()));

        assert!(matches!(
            accuracy(&fc, &test),
            Err(ForecastError::ComputationError(_))
        ));
        assert!(matches!(
            accuracy_with_scale(&fc, &test, &train),
            Err(ForecastError::ComputationError(_))
        ));
    }

    #[test]
    fn accuracy_uses_overlapping_timestamps() {
        let actuals = quarterly(vec![10.0, 20.0, 30.0]);
        let start = NaiveDate::from_ymd_opt(2018, 7, 1).unwrap();
        let fc = Forecast::new(
            vec![start, NaiveDate::from_ymd_opt(2018, 10, 1).unwrap()],
            vec![33.0, 40.0],
            vec![30.0, 35.0],
            vec![36.0, 45.0],
            0.95,
        )
        .unwrap();
        let m = accuracy(&fc, &actuals).unwrap();
        assert_eq!(m.n, 1);
        assert_relative_eq!(m.mae, 3.0);
    }

    #[test]
    fn accuracy_without_overlap_is_range_error() {
        let actuals = quarterly(vec![1.0, 2.0]);
        let later = quarterly(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let fc = Forecast::new(
            later.timestamps()[3..].to_vec(),
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![2.0, 2.0],
            0.95,
        )
        .unwrap();
        assert!(matches!(accuracy(&fc, &actuals), Err(ForecastError::Range(_))));
    }

    #[test]
    fn scaled_metrics_use_seasonal_differences() {
        let training = quarterly(vec![1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0, 6.0]);
        let scale = TrainingScale::from_training(&training).unwrap();
        assert_relative_eq!(scale.mae, 2.0);
        assert_relative_eq!(scale.mse, 4.0);

        let actuals = quarterly(vec![8.0, 9.0]);
        let fc = forecast_for(&actuals, vec![7.0, 10.0]);
        let m = accuracy_with_scale(&fc, &actuals, &training).unwrap();
        assert_relative_eq!(m.mase, 0.5);
        assert_relative_eq!(m.rmsse, 0.5);
    }

    #[test]
    fn mean_of_averages_metrics() {
        let a = calculate_metrics(&[1.0], &[2.0], None).unwrap();
        let b = calculate_metrics(&[1.0], &[4.0], None).unwrap();
        let mean = AccuracyMetrics::mean_of(&[a, b]).unwrap();
        assert_relative_eq!(mean.rmse, 2.0);
        assert_eq!(mean.n, 2);
        assert!(AccuracyMetrics::mean_of(&[]).is_none());
    }
}
