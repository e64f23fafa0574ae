//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are NaN.

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = current;

    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = current;
    }
    out
}
