//! On-Balance Volume.
//!
//! OBV[0] = volume[0]; then add volume on an up close, subtract it on a
//! down close, carry forward on an unchanged close. No warmup.

pub fn obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    let mut running = 0.0;
    for (i, (&close, &volume)) in closes.iter().zip(volumes).enumerate() {
        if i == 0 {
            running = volume;
        } else if close > closes[i - 1] {
            running += volume;
        } else if close < closes[i - 1] {
            running -= volume;
        }
        out.push(running);
    }
    out
}
