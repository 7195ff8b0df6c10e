//! Core data structures for time series forecasting.

mod forecast;
mod store;
mod time_series;

pub use forecast::{Forecast, ForecastRow, DEFAULT_LEVEL};
pub use store::SeriesStore;
pub use time_series::{Frequency, TimeSeries};
