//! Rate of Change: ((P[i] - P[i-n]) / P[i-n]) * 100, and 0 when P[i-n] == 0.
//! Warmup: first n values are NaN.

pub fn roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period..values.len() {
        let prev = values[i - period];
        out[i] = if prev == 0.0 {
            0.0
        } else {
            (values[i] - prev) / prev * 100.0
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::assert_close;

    #[test]
    fn roc_basic() {
        let out = roc(&[100.0, 110.0, 121.0], 1);
        assert!(out[0].is_nan());
        assert_close(out[1], 10.0);
        assert_close(out[2], 10.0);
    }

    #[test]
    fn roc_zero_base() {
        let out = roc(&[0.0, 5.0], 1);
        assert_close(out[1], 0.0);
    }
}
