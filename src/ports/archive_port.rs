//! Fire-and-forget persistence of activated series.
//!
//! Called from a background worker, hence `Send + Sync`.

use crate::domain::chart_indicator::NamedSeries;
use crate::domain::error::ChartError;
use chrono::NaiveDateTime;

pub trait SeriesArchivePort: Send + Sync {
    fn archive_series(
        &self,
        symbol: &str,
        identifier: &str,
        timestamps: &[NaiveDateTime],
        series: &[NamedSeries],
    ) -> Result<(), ChartError>;
}
