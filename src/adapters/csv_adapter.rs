//! CSV file adapter: base series bars and trading records.

use crate::domain::error::ChartError;
use crate::domain::ohlcv::{BaseSeries, OhlcvBar};
use crate::domain::trading::{OrderType, TradingRecord};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn data_error(reason: String) -> ChartError {
    ChartError::Data { reason }
}

fn column<'a>(record: &'a csv::StringRecord, index: usize, name: &str) -> Result<&'a str, ChartError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| data_error(format!("missing {name} column")))
}

fn number<T: std::str::FromStr>(record: &csv::StringRecord, index: usize, name: &str) -> Result<T, ChartError>
where
    T::Err: std::fmt::Display,
{
    column(record, index, name)?
        .parse()
        .map_err(|e| data_error(format!("invalid {name} value: {e}")))
}

/// Dates are either `YYYY-MM-DD` (midnight) or `YYYY-MM-DD HH:MM:SS`.
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ChartError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| data_error(format!("invalid date format {raw:?}: {e}")))
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Read `side,entry_index,entry_price,exit_index,exit_price,amount`
    /// rows. Every row must have the same side, which becomes the record's
    /// starting order type.
    pub fn load_trading_record(path: &Path) -> Result<TradingRecord, ChartError> {
        let content = fs::read_to_string(path).map_err(|e| {
            data_error(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut record: Option<TradingRecord> = None;

        for (line, result) in rdr.records().enumerate() {
            let row = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;
            let side: OrderType = column(&row, 0, "side")?
                .parse()
                .map_err(|e| data_error(format!("row {}: {e}", line + 1)))?;
            let trading = record.get_or_insert_with(|| TradingRecord::new(side));
            if trading.starting_type() != side {
                return Err(data_error(format!(
                    "row {}: side {} differs from the record's {}",
                    line + 1,
                    side.as_str(),
                    trading.starting_type().as_str()
                )));
            }
            let amount: f64 = number(&row, 5, "amount")?;
            trading.enter(number(&row, 1, "entry_index")?, number(&row, 2, "entry_price")?, amount)?;
            trading.exit(number(&row, 3, "exit_index")?, number(&row, 4, "exit_price")?, amount)?;
        }

        record.ok_or_else(|| data_error(format!("{} has no trades", path.display())))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BaseSeries, ChartError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            data_error(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;

            let timestamp = parse_timestamp(column(&record, 0, "date")?)?;
            let date = timestamp.date();
            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                timestamp,
                open: number(&record, 1, "open")?,
                high: number(&record, 2, "high")?,
                low: number(&record, 3, "low")?,
                close: number(&record, 4, "close")?,
                volume: number(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        BaseSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            if let Some(symbol) = name.to_string_lossy().strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
