//! Moving Average Convergence Divergence.
//!
//! MACD line = EMA(fast) - EMA(slow)
//! Signal line = EMA(signal) of the MACD line
//! Histogram = MACD line - signal line
//!
//! Defaults: fast=12, slow=26, signal=9.

use crate::domain::indicator::{after_warmup, ema};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdLines {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = after_warmup(&line, |tail| ema(tail, signal_period));
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();
    MacdLines {
        macd: line,
        signal,
        histogram,
    }
}
