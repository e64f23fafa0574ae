//! Bollinger Bands.
//!
//! Middle: SMA over n values; upper/lower: middle ± multiplier × population
//! standard deviation (divides by N).
//! Defaults: period=20, multiplier=2.0. Warmup: first (n-1) values are NaN.

use crate::domain::indicator::{sma, stddev};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let middle = sma(values, period);
    let deviation = stddev(values, period);
    let upper = middle
        .iter()
        .zip(&deviation)
        .map(|(m, d)| m + multiplier * d)
        .collect();
    let lower = middle
        .iter()
        .zip(&deviation)
        .map(|(m, d)| m - multiplier * d)
        .collect();
    BollingerBands {
        upper,
        middle,
        lower,
    }
}
