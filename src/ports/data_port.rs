//! Base series acquisition port.

use crate::domain::error::ChartError;
use crate::domain::ohlcv::BaseSeries;
use chrono::NaiveDate;

/// Implementations must return bars in ascending, duplicate-free order.
pub trait DataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BaseSeries, ChartError>;

    fn list_symbols(&self) -> Result<Vec<String>, ChartError>;
}
