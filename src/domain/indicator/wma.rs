//! Weighted Moving Average.
//!
//! O(n) sliding window: WMA(n) = (1*P[i-n+1] + ... + n*P[i]) / (n*(n+1)/2).
//! Warmup: first (n-1) values are NaN.

pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || period > values.len() {
        return out;
    }

    let n = period as f64;
    let divisor = n * (n + 1.0) / 2.0;
    let mut weighted_sum = 0.0;
    let mut window_sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i < period {
            weighted_sum += (i + 1) as f64 * v;
            window_sum += v;
        } else {
            weighted_sum += period as f64 * v - window_sum;
            window_sum += v - values[i - period];
        }
        if i + 1 >= period {
            out[i] = weighted_sum / divisor;
        }
    }
    out
}
