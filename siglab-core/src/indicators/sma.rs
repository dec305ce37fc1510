//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window.
//! Lookback: period - 1 counted from the first valid input.

use super::first_valid;

/// Rolling mean of `values`. A window containing NaN yields NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
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

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate().skip(start) {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= start + period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= start + period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);
        assert_eq!(result.len(), 7);
        for v in &result[..4] {
            assert!(v.is_nan());
        }
        // mean(10..=14) = 12
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_propagation() {
        let result = sma(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0], 3);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert_approx(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn leading_nans_are_skipped() {
        let result = sma(&[f64::NAN, f64::NAN, 1.0, 2.0, 3.0], 2);
        assert!(result[2].is_nan());
        assert_approx(result[3], 1.5, DEFAULT_EPSILON);
        assert_approx(result[4], 2.5, DEFAULT_EPSILON);
    }

    #[test]
    fn too_short_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
    }
}
