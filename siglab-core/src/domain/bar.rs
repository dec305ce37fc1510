//! OHLC bar and the open position a tracker manages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::events::Side;

/// One OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Open position as seen by a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    /// Completed bars since entry, including the current one.
    pub bars_held: usize,
    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,
    pub stop: Option<f64>,
    pub target: Option<f64>,
}

impl OpenPosition {
    pub fn new(side: Side, entry_price: f64, entry_time: NaiveDateTime) -> Self {
        Self {
            side,
            entry_price,
            entry_time,
            bars_held: 0,
            highest_since_entry: entry_price,
            lowest_since_entry: entry_price,
            stop: None,
            target: None,
        }
    }

    /// Advance bookkeeping by one bar.
    pub fn observe(&mut self, bar: &Bar) {
        self.bars_held += 1;
        if !bar.high.is_nan() {
            self.highest_since_entry = self.highest_since_entry.max(bar.high);
        }
        if !bar.low.is_nan() {
            self.lowest_since_entry = self.lowest_since_entry.min(bar.low);
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.as_f64() * (price - self.entry_price)
    }
}
