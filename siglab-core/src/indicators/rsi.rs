//! Relative Strength Index (RSI).
//!
//! Average gains and losses are smoothed with a configurable smoother.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; no movement → 50.

use super::{smooth, SmoothingKind};

/// RSI of `values` over `period`, with gains and losses smoothed by `kind`.
pub fn rsi(values: &[f64], period: usize, kind: SmoothingKind) -> Vec<f64> {
    let n = values.len();
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let change = values[i] - values[i - 1];
        if change.is_nan() {
            continue;
        }
        gains[i] = change.max(0.0);
        losses[i] = (-change).max(0.0);
    }

    let avg_gain = smooth(&gains, period, kind);
    let avg_loss = smooth(&losses, period, kind);
    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() {
                f64::NAN
            } else {
                compute_rsi(g, l)
            }
        })
        .collect()
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
