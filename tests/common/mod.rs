#![allow(dead_code)]

use chartdesk::domain::chart_indicator::NamedSeries;
use chartdesk::domain::document::{InstanceNode, ParamNode, ParameterDocument};
use chartdesk::domain::error::ChartError;
use chartdesk::domain::key::IndicatorKey;
pub use chartdesk::domain::ohlcv::{BaseSeries, OhlcvBar};
use chartdesk::domain::store::ParameterStore;
use chartdesk::ports::archive_port::SeriesArchivePort;
use chartdesk::ports::data_port::DataPort;
use chartdesk::ports::storage_port::ParameterStoragePort;
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Mutex;

/// Storage that keeps every write in a shared log and can be told to fail.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub initial: ParameterDocument,
    pub writes: Rc<RefCell<Vec<String>>>,
    pub fail: Rc<Cell<bool>>,
}

impl MemoryStorage {
    pub fn with_document(initial: ParameterDocument) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    fn record(&self, entry: String) -> Result<(), ChartError> {
        if self.fail.get() {
            return Err(ChartError::persistence("storage offline"));
        }
        self.writes.borrow_mut().push(entry);
        Ok(())
    }
}

impl ParameterStoragePort for MemoryStorage {
    fn load_document(&self) -> Result<ParameterDocument, ChartError> {
        Ok(self.initial.clone())
    }

    fn write_definition(&self, indicator_type: &str, _description: &str) -> Result<(), ChartError> {
        self.record(format!("define {indicator_type}"))
    }

    fn write_instance(&self, indicator_type: &str, instance: &InstanceNode) -> Result<(), ChartError> {
        self.record(format!("instance {indicator_type}_{}", instance.id))
    }

    fn write_parameter(&self, key: &IndicatorKey, name: &str, value: &str) -> Result<(), ChartError> {
        self.record(format!("param {key} {name}={value}"))
    }

    fn write_category(&self, key: &IndicatorKey, category: &str) -> Result<(), ChartError> {
        self.record(format!("category {key} {category}"))
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BaseSeries, ChartError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ChartError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| {
                let date = b.timestamp.date();
                date >= start_date && date <= end_date
            })
            .collect();
        BaseSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Archive that records identifiers, optionally failing every call.
#[derive(Default)]
pub struct RecordingArchive {
    pub archived: Mutex<Vec<String>>,
    pub fail: bool,
}

impl SeriesArchivePort for RecordingArchive {
    fn archive_series(
        &self,
        symbol: &str,
        identifier: &str,
        timestamps: &[NaiveDateTime],
        series: &[NamedSeries],
    ) -> Result<(), ChartError> {
        if self.fail {
            return Err(ChartError::persistence("archive offline"));
        }
        assert!(series.iter().all(|s| s.values.len() == timestamps.len()));
        if let Ok(mut archived) = self.archived.lock() {
            archived.push(format!("{symbol}/{identifier}"));
        }
        Ok(())
    }
}

pub fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(offset)
}

pub fn make_bar(offset: i64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: day(offset),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10_000.0 + offset as f64,
    }
}

/// `len` bars with a gentle zig-zag uptrend.
pub fn trending_bars(len: usize) -> Vec<OhlcvBar> {
    (0..len)
        .map(|i| {
            let wiggle = if i % 2 == 0 { 0.5 } else { -0.5 };
            make_bar(i as i64, 100.0 + i as f64 * 0.4 + wiggle)
        })
        .collect()
}

pub fn base_series(len: usize) -> BaseSeries {
    BaseSeries::new("BHP", trending_bars(len)).unwrap()
}

pub fn key(raw: &str) -> IndicatorKey {
    raw.parse().unwrap()
}

pub fn param(name: &str, type_tag: &str, value: &str) -> ParamNode {
    ParamNode {
        name: name.into(),
        type_tag: type_tag.into(),
        value: value.into(),
    }
}

pub fn instance(id: u32, category: Option<&str>, params: Vec<ParamNode>) -> InstanceNode {
    InstanceNode {
        id,
        category: category.map(str::to_string),
        params,
    }
}

/// EMA_1 (20, overlay), EMA_2 (60, subplot), SMA_1 smoothing EMA_1, an RSI
/// with a malformed period and an unknown category, and a BOLLINGER band.
pub fn chart_document() -> ParameterDocument {
    let mut doc = ParameterDocument::new();
    doc.define("EMA", "Exponential moving average");
    doc.push_instance(
        "EMA",
        instance(
            1,
            Some("MOVING_AVERAGE"),
            vec![
                param("TimeFrame", "Integer", "20"),
                param("Placement", "ChartPlacement", "Overlay"),
                param("Color", "Color", "#FF7F0E"),
            ],
        ),
    );
    doc.push_instance(
        "EMA",
        instance(
            2,
            Some("MOVING_AVERAGE"),
            vec![
                param("TimeFrame", "Integer", "60"),
                param("Placement", "ChartPlacement", "Subplot"),
            ],
        ),
    );
    doc.define("SMA", "Simple moving average");
    doc.push_instance(
        "SMA",
        instance(
            1,
            Some("MOVING_AVERAGE"),
            vec![
                param("TimeFrame", "Integer", "5"),
                param("Source", "IndicatorRef", "EMA_1"),
                param("Placement", "ChartPlacement", "Overlay"),
            ],
        ),
    );
    doc.define("RSI", "Relative strength index");
    doc.push_instance(
        "RSI",
        instance(
            1,
            Some("HOROSCOPE"),
            vec![
                param("TimeFrame", "Integer", "fourteen"),
                param("Placement", "ChartPlacement", "Subplot"),
            ],
        ),
    );
    doc.define("BOLLINGER", "Bollinger bands");
    doc.push_instance(
        "BOLLINGER",
        instance(
            1,
            Some("VOLATILITY"),
            vec![
                param("TimeFrame", "Integer", "20"),
                param("Multiplier", "Double", "2"),
                param("Placement", "ChartPlacement", "Overlay"),
            ],
        ),
    );
    doc
}

pub fn chart_store() -> (ParameterStore, MemoryStorage) {
    let storage = MemoryStorage::with_document(chart_document());
    let store = ParameterStore::open(Box::new(storage.clone())).unwrap();
    (store, storage)
}
