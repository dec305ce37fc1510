//! TimeSeries — ordered (timestamp, value) pairs with a strictly increasing index.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::interval::Interval;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("index has {index} timestamps but {values} values")]
    LengthMismatch { index: usize, values: usize },

    #[error("timestamps must be strictly increasing (position {position}: {previous} >= {current})")]
    NotIncreasing {
        position: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
}

/// Time-indexed series. Timestamps are strictly increasing, so duplicates
/// are impossible by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct TimeSeries<T> {
    index: Vec<NaiveDateTime>,
    values: Vec<T>,
}

/// Unchecked wire form; decoding goes through `TimeSeries::new`.
#[derive(Deserialize)]
struct RawSeries<T> {
    index: Vec<NaiveDateTime>,
    values: Vec<T>,
}

impl<T> TryFrom<RawSeries<T>> for TimeSeries<T> {
    type Error = SeriesError;

    fn try_from(raw: RawSeries<T>) -> Result<Self, Self::Error> {
        Self::new(raw.index, raw.values)
    }
}

/// Per-symbol signal series handed to a backtest engine.
///
/// Values: sign gives the side, `0.0` means flat, NaN is a placeholder
/// that carries no trading meaning.
pub type SignalFrame = BTreeMap<String, TimeSeries<f64>>;

impl<T> TimeSeries<T> {
    pub fn new(index: Vec<NaiveDateTime>, values: Vec<T>) -> Result<Self, SeriesError> {
        if index.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                index: index.len(),
                values: values.len(),
            });
        }
        check_increasing(&index)?;
        Ok(Self { index, values })
    }

    /// Caller guarantees a strictly increasing index of matching length.
    pub(crate) fn from_sorted(index: Vec<NaiveDateTime>, values: Vec<T>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self { index, values }
    }

    pub fn empty() -> Self {
        Self {
            index: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, &T)> + '_ {
        self.index.iter().copied().zip(self.values.iter())
    }

    /// Value at an exact timestamp.
    pub fn get(&self, ts: NaiveDateTime) -> Option<&T> {
        self.index
            .binary_search(&ts)
            .ok()
            .map(|pos| &self.values[pos])
    }

    /// Same index, values transformed.
    pub fn map<U>(&self, mut f: impl FnMut(NaiveDateTime, &T) -> U) -> TimeSeries<U> {
        TimeSeries {
            index: self.index.clone(),
            values: self.iter().map(|(t, v)| f(t, v)).collect(),
        }
    }
}

impl<T: Clone> TimeSeries<T> {
    /// Entries whose timestamps fall inside `interval` (both bounds inclusive).
    pub fn slice(&self, interval: &Interval) -> Self {
        let range = interval.positions(&self.index);
        Self {
            index: self.index[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        }
    }
}

impl TimeSeries<f64> {
    /// Series of the same value at every timestamp.
    pub fn constant(index: Vec<NaiveDateTime>, value: f64) -> Result<Self, SeriesError> {
        let values = vec![value; index.len()];
        Self::new(index, values)
    }
}

pub(crate) fn check_increasing(index: &[NaiveDateTime]) -> Result<(), SeriesError> {
    for (position, pair) in index.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(SeriesError::NotIncreasing {
                position: position + 1,
                previous: pair[0],
                current: pair[1],
            });
        }
    }
    Ok(())
}
