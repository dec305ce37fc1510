//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1]
//! Seed: SMA of the first `period` valid values.
//! Lookback: period - 1 counted from the first valid input.

use super::first_valid;

/// EMA with `alpha = 2 / (period + 1)`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    ema_with_alpha(values, period, 2.0 / (period as f64 + 1.0))
}

/// EMA seeded by an SMA of `period` values, then smoothed with `alpha`.
///
/// A NaN after the seed taints every later value.
pub fn ema_with_alpha(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let Some(start) = first_valid(values) else {
        return result;
    };
    if n - start < period {
        return result;
    }

    let seed_window = &values[start..start + period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    let seed_at = start + period - 1;
    result[seed_at] = seed;

    let mut prev = seed;
    for i in (seed_at + 1)..n {
        if values[i].is_nan() {
            return result;
        }
        let next = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = next;
        prev = next;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_seeded_by_sma() {
        let result = ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        // seed = mean(1,2,3) = 2; alpha = 0.5
        assert_approx(result[2], 2.0, DEFAULT_EPSILON);
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let result = ema(&[7.0; 20], 5);
        for v in &result[4..] {
            assert_approx(*v, 7.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ema_skips_leading_nans() {
        let result = ema(&[f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
        // alpha = 2/3: 2/3*6 + 1/3*3 = 5
        assert_approx(result[3], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_after_seed_taints_rest() {
        let result = ema(&[1.0, 2.0, f64::NAN, 4.0], 2);
        assert!(!result[1].is_nan());
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }
}
