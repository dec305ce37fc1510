//! Smoothing and oscillator primitives over plain `f64` slices.
//!
//! Every function returns a vector the same length as its input with NaN
//! wherever the lookback is not yet satisfied. Leading NaNs in the input are
//! skipped, so indicators can be chained (e.g. an EMA of an SMA difference).

pub mod ema;
pub mod rolling;
pub mod rsi;
pub mod sma;

pub use ema::ema;
pub use rolling::{rolling_sum, shift};
pub use rsi::rsi;
pub use sma::sma;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Moving-average flavour used by generators that accept a smoother parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingKind {
    #[default]
    Sma,
    Ema,
    /// Exponential smoothing with `alpha = 1 / period`.
    Wilder,
}

impl SmoothingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingKind::Sma => "sma",
            SmoothingKind::Ema => "ema",
            SmoothingKind::Wilder => "wilder",
        }
    }
}

impl fmt::Display for SmoothingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmoothingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sma" => Ok(SmoothingKind::Sma),
            "ema" => Ok(SmoothingKind::Ema),
            "wilder" | "rma" => Ok(SmoothingKind::Wilder),
            other => Err(format!("unknown smoother '{other}' (expected sma, ema or wilder)")),
        }
    }
}

/// Smooth `values` over `period` with the chosen kind.
pub fn smooth(values: &[f64], period: usize, kind: SmoothingKind) -> Vec<f64> {
    match kind {
        SmoothingKind::Sma => sma(values, period),
        SmoothingKind::Ema => ema(values, period),
        SmoothingKind::Wilder => ema::ema_with_alpha(values, period, 1.0 / period.max(1) as f64),
    }
}

/// Index of the first non-NaN value.
pub(crate) fn first_valid(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_kind_parses_case_insensitively() {
        assert_eq!("EMA".parse::<SmoothingKind>().unwrap(), SmoothingKind::Ema);
        assert_eq!("rma".parse::<SmoothingKind>().unwrap(), SmoothingKind::Wilder);
        assert!("hull".parse::<SmoothingKind>().is_err());
    }

    #[test]
    fn smooth_dispatches() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_approx(smooth(&v, 2, SmoothingKind::Sma)[3], 3.5, DEFAULT_EPSILON);
        assert_approx(smooth(&v, 1, SmoothingKind::Ema)[2], 3.0, DEFAULT_EPSILON);
    }
}
