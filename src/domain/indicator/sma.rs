//! Simple Moving Average: mean of the last n values, rolling sum.
//! Warmup: first (n-1) values are NaN.

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = sum / period as f64;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::assert_close;

    #[test]
    fn sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_close(out[2], 2.0);
        assert_close(out[3], 3.0);
        assert_close(out[4], 4.0);
    }

    #[test]
    fn sma_period_longer_than_input() {
        let out = sma(&[1.0, 2.0], 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_period_0() {
        let out = sma(&[1.0, 2.0], 0);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
