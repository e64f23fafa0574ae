//! Computation engine backed by the builtin indicator math.
//!
//! Single-output indicators produce a series named `value`. The `Source`
//! input (a SeriesRef or IndicatorRef parameter) defaults to the close.

use crate::domain::chart_indicator::{ComputationInputs, NamedSeries};
use crate::domain::error::ChartError;
use crate::domain::indicator::{self, after_warmup};
use crate::domain::key::IndicatorKey;
use crate::domain::ohlcv::BaseSeries;
use crate::domain::parameter::PriceField;
use crate::ports::computation_port::ComputationPort;

pub const VALUE_SERIES: &str = "value";

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngine;

impl BuiltinEngine {
    pub fn new() -> Self {
        Self
    }

    /// Indicator types this engine computes.
    pub fn supported_types() -> &'static [&'static str] {
        &[
            "SMA", "EMA", "WMA", "RSI", "MACD", "BOLLINGER", "ROC", "OBV", "STDDEV", "ATR",
        ]
    }
}

fn failure(key: &IndicatorKey, reason: String) -> ChartError {
    ChartError::ComputationFailure {
        key: key.to_string(),
        reason,
    }
}

fn period(
    key: &IndicatorKey,
    inputs: &ComputationInputs,
    name: &str,
    default: usize,
) -> Result<usize, ChartError> {
    match inputs.integer(name) {
        None => Ok(default),
        Some(v) if v > 0 => usize::try_from(v).map_err(|e| failure(key, format!("{name}: {e}"))),
        Some(v) => Err(failure(key, format!("{name} must be positive, got {v}"))),
    }
}

fn value(values: Vec<f64>) -> Vec<NamedSeries> {
    vec![NamedSeries::new(VALUE_SERIES, values)]
}

impl ComputationPort for BuiltinEngine {
    fn compute(
        &self,
        key: &IndicatorKey,
        base: &BaseSeries,
        inputs: &ComputationInputs,
    ) -> Result<Vec<NamedSeries>, ChartError> {
        let source = inputs
            .input("Source")
            .map(<[f64]>::to_vec)
            .unwrap_or_else(|| base.column(PriceField::Close));

        let series = match key.indicator_type().to_ascii_uppercase().as_str() {
            "SMA" => {
                let n = period(key, inputs, "TimeFrame", 20)?;
                value(after_warmup(&source, |s| indicator::sma(s, n)))
            }
            "EMA" => {
                let n = period(key, inputs, "TimeFrame", 20)?;
                value(after_warmup(&source, |s| indicator::ema(s, n)))
            }
            "WMA" => {
                let n = period(key, inputs, "TimeFrame", 20)?;
                value(after_warmup(&source, |s| indicator::wma(s, n)))
            }
            "RSI" => {
                let n = period(key, inputs, "TimeFrame", 14)?;
                value(after_warmup(&source, |s| indicator::rsi(s, n)))
            }
            "ROC" => {
                let n = period(key, inputs, "TimeFrame", 12)?;
                value(after_warmup(&source, |s| indicator::roc(s, n)))
            }
            "STDDEV" => {
                let n = period(key, inputs, "TimeFrame", 20)?;
                value(after_warmup(&source, |s| indicator::stddev(s, n)))
            }
            "MACD" => {
                let fast = period(key, inputs, "ShortTimeFrame", indicator::macd::DEFAULT_FAST)?;
                let slow = period(key, inputs, "LongTimeFrame", indicator::macd::DEFAULT_SLOW)?;
                let signal = period(key, inputs, "SignalTimeFrame", indicator::macd::DEFAULT_SIGNAL)?;
                if fast >= slow {
                    return Err(failure(
                        key,
                        format!("ShortTimeFrame ({fast}) must be below LongTimeFrame ({slow})"),
                    ));
                }
                let lines = indicator::macd(&source, fast, slow, signal);
                vec![
                    NamedSeries::new("macd", lines.macd),
                    NamedSeries::new("signal", lines.signal),
                    NamedSeries::new("histogram", lines.histogram),
                ]
            }
            "BOLLINGER" => {
                let n = period(key, inputs, "TimeFrame", 20)?;
                let multiplier = inputs.double("Multiplier").unwrap_or(2.0);
                if !(multiplier > 0.0) {
                    return Err(failure(key, format!("Multiplier must be positive, got {multiplier}")));
                }
                let bands = indicator::bollinger(&source, n, multiplier);
                vec![
                    NamedSeries::new("upper", bands.upper),
                    NamedSeries::new("middle", bands.middle),
                    NamedSeries::new("lower", bands.lower),
                ]
            }
            "OBV" => value(indicator::obv(&source, &base.column(PriceField::Volume))),
            "ATR" => {
                let n = period(key, inputs, "TimeFrame", 14)?;
                value(indicator::atr(base.bars(), n))
            }
            other => {
                return Err(failure(key, format!("unknown indicator type {other}")));
            }
        };
        Ok(series)
    }
}
