//! Builtin indicator math.
//!
//! Every function returns a vector the same length as its input, with `NaN`
//! for warm-up bars. A period of zero yields an all-`NaN` result; callers
//! that care reject it before computing.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

pub use atr::atr;
pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema;
pub use macd::{macd, MacdLines};
pub use obv::obv;
pub use roc::roc;
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::stddev;
pub use wma::wma;

/// Apply `f` to the part of `values` after its leading `NaN`s and pad the
/// result back to full length. Lets an indicator consume another indicator's
/// output, which starts with its own warm-up.
pub fn after_warmup(values: &[f64], f: impl FnOnce(&[f64]) -> Vec<f64>) -> Vec<f64> {
    let start = values
        .iter()
        .position(|v| !v.is_nan())
        .unwrap_or(values.len());
    let mut out = vec![f64::NAN; start];
    out.extend(f(&values[start..]));
    out
}

#[cfg(test)]
pub(crate) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
