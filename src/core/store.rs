//! Named collection of regular series.

use super::time_series::TimeSeries;
use crate::error::{ForecastError, Result};
use std::collections::BTreeMap;

/// A keyed collection of series that only admits regular series.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    series: BTreeMap<String, TimeSeries>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series under `name`, replacing any previous entry.
    ///
    /// The series must be non-empty and regular; its key is set to `name`.
    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "series name must not be empty".to_string(),
            ));
        }
        if series.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        series.assert_regular()?;
        let series = series.with_key(name.clone());
        self.series.insert(name, series);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TimeSeries> {
        self.series.get(name)
    }

    /// Iterate over series in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.series.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frequency;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn store_insert_and_get() {
        let mut store = SeriesStore::new();
        let ts = TimeSeries::from_start(date(2000, 1), Frequency::Annual, vec![1.0, 2.0, 3.0]).unwrap();
        store.insert("gdp", ts).unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get("gdp").unwrap();
        assert_eq!(stored.key(), Some("gdp"));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn store_rejects_irregular_series() {
        let mut store = SeriesStore::new();
        let ts = TimeSeries::new(
            vec![date(2000, 1), date(2000, 4), date(2001, 1)],
            vec![1.0, 2.0, 3.0],
            Frequency::Quarterly,
        )
        .unwrap();
        assert!(matches!(
            store.insert("bad", ts),
            Err(ForecastError::IrregularSeries(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn store_iterates_in_name_order() {
        let mut store = SeriesStore::new();
        for name in ["b", "a", "c"] {
            let ts = TimeSeries::from_start(date(2000, 1), Frequency::Monthly, vec![1.0; 4]).unwrap();
            store.insert(name, ts).unwrap();
        }
        let names: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
