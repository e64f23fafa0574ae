//! OHLCV bars and the base series indicators are aligned to.

use crate::domain::error::ChartError;
use crate::domain::parameter::PriceField;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn field(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
            PriceField::Typical => self.typical_price(),
        }
    }
}

/// Ascending, duplicate-free bars for one symbol. Every indicator series is
/// indexed by the bar index of this series.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl BaseSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, ChartError> {
        let symbol = symbol.into();
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(ChartError::Data {
                reason: format!(
                    "{symbol}: bar {} at {} is not after {}",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| b.field(field)).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}
