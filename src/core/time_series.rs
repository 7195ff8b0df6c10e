//! TimeSeries data structure for regular, calendar-indexed observations.

use crate::error::{ForecastError, Result};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One observation per year.
    Annual,
    /// Four observations per year.
    Quarterly,
    /// Twelve observations per year.
    Monthly,
}

impl Frequency {
    /// Number of observations in one seasonal cycle.
    pub fn period(&self) -> usize {
        match self {
            Frequency::Annual => 1,
            Frequency::Quarterly => 4,
            Frequency::Monthly => 12,
        }
    }

    /// Calendar months spanned by one period.
    pub fn months_per_period(&self) -> u32 {
        match self {
            Frequency::Annual => 12,
            Frequency::Quarterly => 3,
            Frequency::Monthly => 1,
        }
    }

    /// Check if the frequency has a seasonal cycle longer than one observation.
    pub fn is_seasonal(&self) -> bool {
        self.period() > 1
    }

    /// Advance `date` by `steps` periods.
    ///
    /// Month arithmetic clamps to the end of shorter months, so callers that
    /// need a stable index should always advance from the same anchor.
    pub fn advance(&self, date: NaiveDate, steps: usize) -> Result<NaiveDate> {
        let months = u32::try_from(steps)
            .ok()
            .and_then(|s| s.checked_mul(self.months_per_period()))
            .ok_or_else(|| {
                ForecastError::TimestampError(format!("cannot advance {} by {} periods", date, steps))
            })?;
        date.checked_add_months(Months::new(months))
            .ok_or_else(|| {
                ForecastError::TimestampError(format!("date overflow advancing {}", date))
            })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Annual => "annual",
            Frequency::Quarterly => "quarterly",
            Frequency::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

/// A univariate time series with dates, values and a declared frequency.
///
/// Timestamps are strictly increasing. The series is immutable: every
/// transformation returns a new series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDate>,
    values: Vec<f64>,
    frequency: Frequency,
    key: Option<String>,
}

impl TimeSeries {
    /// Create a new series, validating that timestamps are strictly increasing.
    pub fn new(timestamps: Vec<NaiveDate>, values: Vec<f64>, frequency: Frequency) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        Ok(Self {
            timestamps,
            values,
            frequency,
            key: None,
        })
    }

    /// Create a regular series starting at `start`.
    pub fn from_start(start: NaiveDate, frequency: Frequency, values: Vec<f64>) -> Result<Self> {
        let timestamps = (0..values.len())
            .map(|i| frequency.advance(start, i))
            .collect::<Result<Vec<_>>>()?;
        Self::new(timestamps, values, frequency)
    }

    /// Attach a grouping key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Seasonal period implied by the frequency.
    pub fn period(&self) -> usize {
        self.frequency.period()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDate> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDate> {
        self.timestamps.last().copied()
    }

    /// Position of `date` in the index, if present.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.timestamps.binary_search(&date).ok()
    }

    /// Check if the series contains NaN or infinite values.
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Check if every value is strictly positive.
    pub fn all_positive(&self) -> bool {
        self.values.iter().all(|&v| v > 0.0)
    }

    /// Return a series with the same index and new values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<TimeSeries> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(TimeSeries {
            timestamps: self.timestamps.clone(),
            values,
            frequency: self.frequency,
            key: self.key.clone(),
        })
    }

    /// The `horizon` timestamps following the last observation.
    pub fn future_timestamps(&self, horizon: usize) -> Result<Vec<NaiveDate>> {
        let anchor = self.first_timestamp().ok_or(ForecastError::EmptyData)?;
        let n = self.len();
        (n..n + horizon)
            .map(|i| self.frequency.advance(anchor, i))
            .collect()
    }

    /// Extract observations `[start, end)` by position.
    pub fn slice_index(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(ForecastError::Range(format!(
                "start index {} is after end index {}",
                start, end
            )));
        }
        if end > self.len() {
            return Err(ForecastError::Range(format!(
                "end index {} exceeds series length {}",
                end,
                self.len()
            )));
        }

        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            frequency: self.frequency,
            key: self.key.clone(),
        })
    }

    /// The first `n` observations.
    pub fn head(&self, n: usize) -> Result<TimeSeries> {
        self.slice_index(0, n)
    }

    /// Extract observations with `start <= timestamp <= end`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries> {
        if start > end {
            return Err(ForecastError::Range(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let from = self.timestamps.partition_point(|t| *t < start);
        let to = self.timestamps.partition_point(|t| *t <= end);
        if from >= to {
            return Err(ForecastError::Range(format!(
                "range {}..={} lies outside the series index",
                start, end
            )));
        }

        self.slice_index(from, to)
    }

    /// Split into observations up to and including `date`, and the rest.
    pub fn split_at_date(&self, date: NaiveDate) -> Result<(TimeSeries, TimeSeries)> {
        let cut = self.timestamps.partition_point(|t| *t <= date);
        self.split_at_position(cut)
    }

    /// Hold out the last `test_len` observations.
    pub fn train_test_split(&self, test_len: usize) -> Result<(TimeSeries, TimeSeries)> {
        let cut = self.len().checked_sub(test_len).ok_or_else(|| {
            ForecastError::Range(format!(
                "test length {} exceeds series length {}",
                test_len,
                self.len()
            ))
        })?;
        self.split_at_position(cut)
    }

    fn split_at_position(&self, cut: usize) -> Result<(TimeSeries, TimeSeries)> {
        if cut == 0 || cut >= self.len() {
            return Err(ForecastError::Range(
                "split would leave an empty training or test set".to_string(),
            ));
        }
        Ok((self.slice_index(0, cut)?, self.slice_index(cut, self.len())?))
    }

    /// Verify that timestamps are evenly spaced at the declared frequency.
    ///
    /// Every timestamp must equal the first timestamp advanced by its index,
    /// which catches both gaps and misaligned dates.
    pub fn assert_regular(&self) -> Result<()> {
        let Some(anchor) = self.first_timestamp() else {
            return Ok(());
        };

        for (i, &t) in self.timestamps.iter().enumerate().skip(1) {
            let expected = self.frequency.advance(anchor, i)?;
            if t != expected {
                return Err(ForecastError::IrregularSeries(format!(
                    "expected {} at position {} for a {} series, found {}",
                    expected, i, self.frequency, t
                )));
            }
        }

        Ok(())
    }

    /// Check regularity without returning the reason.
    pub fn is_regular(&self) -> bool {
        self.assert_regular().is_ok()
    }
}
