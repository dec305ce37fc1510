//! Sparse signed event series produced by signal generators.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::interval::Interval;
use super::series::TimeSeries;

/// Direction of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(self) -> i8 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.sign())
    }

    /// Side for a signal value; `None` for zero and NaN.
    pub fn from_value(value: f64) -> Option<Self> {
        if value > 0.0 {
            Some(Side::Long)
        } else if value < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }
}

/// How to combine event streams that fire at the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Union of timestamps; the earlier-declared stream keeps a colliding timestamp.
    KeepAll,
    /// The later-declared stream wins a colliding timestamp.
    KeepLast,
}

/// Sparse series of {+1, -1}. A missing timestamp means "no event".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSeries {
    events: BTreeMap<NaiveDateTime, Side>,
}

impl EventSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// One event of `side` at every given timestamp.
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = NaiveDateTime>, side: Side) -> Self {
        Self {
            events: timestamps.into_iter().map(|t| (t, side)).collect(),
        }
    }

    /// Combine streams in declaration order.
    pub fn merge(streams: impl IntoIterator<Item = EventSeries>, policy: MergePolicy) -> Self {
        let mut merged = BTreeMap::new();
        for stream in streams {
            for (ts, side) in stream.events {
                match policy {
                    MergePolicy::KeepLast => {
                        merged.insert(ts, side);
                    }
                    MergePolicy::KeepAll => {
                        merged.entry(ts).or_insert(side);
                    }
                }
            }
        }
        Self { events: merged }
    }

    pub fn insert(&mut self, ts: NaiveDateTime, side: Side) {
        self.events.insert(ts, side);
    }

    pub fn get(&self, ts: NaiveDateTime) -> Option<Side> {
        self.events.get(&ts).copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, Side)> + '_ {
        self.events.iter().map(|(t, s)| (*t, *s))
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.events.keys().copied().collect()
    }

    /// Timestamps carrying `side`.
    pub fn timestamps_of(&self, side: Side) -> Vec<NaiveDateTime> {
        self.events
            .iter()
            .filter(|(_, s)| **s == side)
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn slice(&self, interval: &Interval) -> Self {
        Self {
            events: self
                .events
                .iter()
                .filter(|(t, _)| interval.contains(**t))
                .map(|(t, s)| (*t, *s))
                .collect(),
        }
    }

    /// Dense `+1.0` / `-1.0` series over the event timestamps.
    pub fn to_series(&self) -> TimeSeries<f64> {
        let (index, values): (Vec<_>, Vec<_>) =
            self.events.iter().map(|(t, s)| (*t, s.as_f64())).unzip();
        TimeSeries::from_sorted(index, values)
    }
}

impl FromIterator<(NaiveDateTime, Side)> for EventSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, Side)>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::ts;

    #[test]
    fn keep_last_lets_later_stream_win() {
        let a = EventSeries::from_timestamps([ts(1), ts(2)], Side::Long);
        let b = EventSeries::from_timestamps([ts(2), ts(3)], Side::Short);
        let merged = EventSeries::merge([a, b], MergePolicy::KeepLast);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(ts(2)), Some(Side::Short));
    }

    #[test]
    fn keep_all_unions_and_keeps_first_on_collision() {
        let a = EventSeries::from_timestamps([ts(1), ts(2)], Side::Long);
        let b = EventSeries::from_timestamps([ts(2), ts(3)], Side::Short);
        let merged = EventSeries::merge([a, b], MergePolicy::KeepAll);
        assert_eq!(merged.timestamps(), vec![ts(1), ts(2), ts(3)]);
        assert_eq!(merged.get(ts(2)), Some(Side::Long));
    }

    #[test]
    fn to_series_is_signed() {
        let events: EventSeries = [(ts(5), Side::Short), (ts(1), Side::Long)].into_iter().collect();
        let s = events.to_series();
        assert_eq!(s.index(), &[ts(1), ts(5)]);
        assert_eq!(s.values(), &[1.0, -1.0]);
    }

    #[test]
    fn side_from_value() {
        assert_eq!(Side::from_value(2.0), Some(Side::Long));
        assert_eq!(Side::from_value(-0.5), Some(Side::Short));
        assert_eq!(Side::from_value(0.0), None);
        assert_eq!(Side::from_value(f64::NAN), None);
    }
}
