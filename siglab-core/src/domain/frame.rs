//! Frame — named `f64` columns sharing one strictly increasing timestamp index.
//!
//! This is the market data a signal generator sees. Generators check for the
//! columns they need up front so a missing column fails fast with a
//! descriptive error instead of producing garbage signals.

use chrono::{Duration, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::interval::Interval;
use super::series::{check_increasing, SeriesError, TimeSeries};

/// Required columns are absent from a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing required columns: {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Index(#[from] SeriesError),

    #[error("column '{column}' has {actual} values, index has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Market data for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// Market data for several symbols, keyed by symbol.
pub type MarketData = BTreeMap<String, Frame>;

/// Context a generator is applied in: which symbol and which price column.
///
/// The price column belongs to the market, not to the generator, so it is
/// passed at prediction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketContext {
    pub symbol: String,
    pub price_column: String,
}

impl MarketContext {
    pub fn new(symbol: impl Into<String>, price_column: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price_column: price_column.into(),
        }
    }
}

impl Frame {
    pub fn new(index: Vec<NaiveDateTime>) -> Result<Self, FrameError> {
        check_increasing(&index)?;
        Ok(Self {
            index,
            columns: BTreeMap::new(),
        })
    }

    /// Builder-style column insert.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(FrameError::ColumnLength {
                column: name,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
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

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], SchemaError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SchemaError {
                missing: vec![name.to_string()],
            })
    }

    /// Fail with every absent column listed.
    pub fn require(&self, names: &[&str]) -> Result<(), SchemaError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.columns.contains_key(**n))
            .map(|n| n.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { missing })
        }
    }

    /// One column as a standalone series.
    pub fn series(&self, name: &str) -> Result<TimeSeries<f64>, SchemaError> {
        let values = self.column(name)?.to_vec();
        Ok(TimeSeries::from_sorted(self.index.clone(), values))
    }

    /// Rows whose timestamps fall inside the interval.
    pub fn slice(&self, interval: &Interval) -> Frame {
        let range = interval.positions(&self.index);
        Frame {
            index: self.index[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[range.clone()].to_vec()))
                .collect(),
        }
    }

    /// Most frequent gap between consecutive timestamps.
    ///
    /// Ties resolve to the smaller gap. `None` with fewer than two rows.
    pub fn bar_duration(&self) -> Option<Duration> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for pair in self.index.windows(2) {
            *counts.entry((pair[1] - pair[0]).num_milliseconds()).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(ms, _)| Duration::milliseconds(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::ts;

    fn frame() -> Frame {
        Frame::new((0..4).map(ts).collect())
            .unwrap()
            .with_column("close", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
    }

    #[test]
    fn require_lists_every_missing_column() {
        let err = frame().require(&["open", "close", "high"]).unwrap_err();
        assert_eq!(err.missing, vec!["open".to_string(), "high".to_string()]);
        assert_eq!(err.to_string(), "missing required columns: open, high");
    }

    #[test]
    fn column_length_is_checked() {
        let err = frame().with_column("open", vec![1.0]).unwrap_err();
        assert!(matches!(err, FrameError::ColumnLength { expected: 4, actual: 1, .. }));
    }

    #[test]
    fn slice_keeps_columns_aligned() {
        let f = frame().slice(&Interval::new(Some(ts(1)), Some(ts(2))));
        assert_eq!(f.index(), &[ts(1), ts(2)]);
        assert_eq!(f.column("close").unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn bar_duration_is_modal_gap() {
        let index = vec![ts(0), ts(1), ts(2), ts(5), ts(6)];
        let f = Frame::new(index).unwrap();
        assert_eq!(f.bar_duration(), Some(Duration::hours(1)));
        assert_eq!(Frame::new(vec![ts(0)]).unwrap().bar_duration(), None);
    }
}
