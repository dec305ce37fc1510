//! Closed time interval with optional bounds.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// `[start, stop]`, both inclusive. A missing bound is open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Option<NaiveDateTime>,
    pub stop: Option<NaiveDateTime>,
}

impl Interval {
    pub fn new(start: Option<NaiveDateTime>, stop: Option<NaiveDateTime>) -> Self {
        Self { start, stop }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True only when both bounds are present.
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.stop.is_some()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.stop.map_or(true, |s| ts <= s)
    }

    /// Positions of `index` (sorted ascending) that fall inside the interval.
    pub fn positions(&self, index: &[NaiveDateTime]) -> Range<usize> {
        let lo = match self.start {
            Some(start) => index.partition_point(|t| *t < start),
            None => 0,
        };
        let hi = match self.stop {
            Some(stop) => index.partition_point(|t| *t <= stop),
            None => index.len(),
        };
        lo..hi.max(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::ts;

    #[test]
    fn positions_respect_both_bounds() {
        let index: Vec<_> = (0..6).map(ts).collect();
        assert_eq!(Interval::new(Some(ts(1)), Some(ts(3))).positions(&index), 1..4);
        assert_eq!(Interval::new(None, Some(ts(3))).positions(&index), 0..4);
        assert_eq!(Interval::new(Some(ts(4)), None).positions(&index), 4..6);
        assert_eq!(Interval::unbounded().positions(&index), 0..6);
    }

    #[test]
    fn inverted_interval_is_empty() {
        let index: Vec<_> = (0..6).map(ts).collect();
        assert!(Interval::new(Some(ts(4)), Some(ts(1))).positions(&index).is_empty());
    }

    #[test]
    fn bounded_needs_both_ends() {
        assert!(!Interval::new(Some(ts(0)), None).is_bounded());
        assert!(Interval::new(Some(ts(0)), Some(ts(1))).is_bounded());
    }
}
