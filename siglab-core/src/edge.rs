//! Crossing detection over aligned `f64` series.
//!
//! A crossing is strictly pairwise: it compares sample `t` with `t - 1`, so the
//! first sample is never a crossing. Any comparison involving NaN is false.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EdgeError {
    #[error("threshold has {threshold} values but series has {series}")]
    Misaligned { series: usize, threshold: usize },
}

/// Level a series is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Threshold<'a> {
    Scalar(f64),
    /// Time-varying level aligned position by position with the series.
    Series(&'a [f64]),
}

impl Threshold<'_> {
    fn at(&self, i: usize) -> f64 {
        match self {
            Threshold::Scalar(v) => *v,
            Threshold::Series(s) => s[i],
        }
    }

    fn check(&self, len: usize) -> Result<(), EdgeError> {
        match self {
            Threshold::Series(s) if s.len() != len => Err(EdgeError::Misaligned {
                series: len,
                threshold: s.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl From<f64> for Threshold<'_> {
    fn from(value: f64) -> Self {
        Threshold::Scalar(value)
    }
}

impl<'a> From<&'a [f64]> for Threshold<'a> {
    fn from(values: &'a [f64]) -> Self {
        Threshold::Series(values)
    }
}

impl<'a> From<&'a Vec<f64>> for Threshold<'a> {
    fn from(values: &'a Vec<f64>) -> Self {
        Threshold::Series(values.as_slice())
    }
}

/// Positions where `series` moves from at-or-below the threshold to strictly above it.
pub fn cross_up_positions(series: &[f64], threshold: Threshold<'_>) -> Result<Vec<usize>, EdgeError> {
    threshold.check(series.len())?;
    Ok((1..series.len())
        .filter(|&i| series[i] > threshold.at(i) && series[i - 1] <= threshold.at(i - 1))
        .collect())
}

/// Positions where `series` moves from at-or-above the threshold to strictly below it.
pub fn cross_down_positions(
    series: &[f64],
    threshold: Threshold<'_>,
) -> Result<Vec<usize>, EdgeError> {
    threshold.check(series.len())?;
    Ok((1..series.len())
        .filter(|&i| series[i] < threshold.at(i) && series[i - 1] >= threshold.at(i - 1))
        .collect())
}

/// Timestamps of upward crossings.
pub fn cross_up(
    index: &[NaiveDateTime],
    series: &[f64],
    threshold: Threshold<'_>,
) -> Result<Vec<NaiveDateTime>, EdgeError> {
    aligned(index, series)?;
    Ok(cross_up_positions(series, threshold)?
        .into_iter()
        .map(|i| index[i])
        .collect())
}

/// Timestamps of downward crossings.
pub fn cross_down(
    index: &[NaiveDateTime],
    series: &[f64],
    threshold: Threshold<'_>,
) -> Result<Vec<NaiveDateTime>, EdgeError> {
    aligned(index, series)?;
    Ok(cross_down_positions(series, threshold)?
        .into_iter()
        .map(|i| index[i])
        .collect())
}

fn aligned(index: &[NaiveDateTime], series: &[f64]) -> Result<(), EdgeError> {
    if index.len() == series.len() {
        Ok(())
    } else {
        Err(EdgeError::Misaligned {
            series: index.len(),
            threshold: series.len(),
        })
    }
}
