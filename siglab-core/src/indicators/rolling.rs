//! Rolling window helpers.

/// Rolling sum over `period` values. A window containing NaN yields NaN.
pub fn rolling_sum(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| !v.is_nan()) {
            result[i] = window.iter().sum();
        }
    }
    result
}

/// Values moved `periods` positions later; the first `periods` entries become NaN.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if periods < n {
        result[periods..].copy_from_slice(&values[..n - periods]);
    }
    result
}
