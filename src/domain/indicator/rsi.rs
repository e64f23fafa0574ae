//! Relative Strength Index with Wilder's smoothing.
//!
//! First average gain/loss is the simple mean of the first n changes, then
//! avg = (prev_avg * (n-1) + current) / n.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), and 100 when avg_loss == 0.
//! Warmup: first n values are NaN.

pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().copied().map(gain).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().copied().map(loss).sum::<f64>() / period as f64;
    out[period] = relative_strength(avg_gain, avg_loss);

    for i in period + 1..values.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i] = relative_strength(avg_gain, avg_loss);
    }
    out
}

fn relative_strength(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
