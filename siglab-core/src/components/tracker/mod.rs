//! Trackers — position management applied once a signal has opened a position.
//!
//! Trackers are consulted once per bar while a position is open and answer
//! with a [`TrackerAction`]. Stops and targets obey the ratchet invariant:
//! they may tighten but never loosen. The backtest engine enforces it through
//! [`ratchet_stop`] / [`ratchet_target`]; trackers emit their raw desired levels.

pub mod fixed_stop;
pub mod time_exit;
pub mod trailing_stop;

pub use fixed_stop::FixedStop;
pub use time_exit::TimeExit;
pub use trailing_stop::PercentTrailing;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::signal::Params;
use crate::domain::{Bar, OpenPosition, Side};

/// What the tracker wants done with the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackerAction {
    Hold,
    /// Move the protective stop and/or profit target.
    Update {
        stop: Option<f64>,
        target: Option<f64>,
    },
    /// Close the position at this bar's close.
    Exit,
}

impl TrackerAction {
    pub fn stop(price: f64) -> Self {
        Self::Update {
            stop: Some(price),
            target: None,
        }
    }
}

pub trait Tracker: Send + Sync + fmt::Debug {
    /// Short identifier (e.g., "percent_trailing").
    fn name(&self) -> &str;

    fn params(&self) -> Params;

    /// Evaluate the open position after `bar` has been observed.
    fn on_bar(&self, position: &OpenPosition, bar: &Bar) -> TrackerAction;
}

/// Stop after applying the ratchet: a long stop only rises, a short stop only falls.
pub fn ratchet_stop(side: Side, current: Option<f64>, proposed: f64) -> f64 {
    match (side, current) {
        (_, None) => proposed,
        (Side::Long, Some(c)) => c.max(proposed),
        (Side::Short, Some(c)) => c.min(proposed),
    }
}

/// Target after applying the ratchet: it only moves closer to price.
pub fn ratchet_target(side: Side, current: Option<f64>, proposed: f64) -> f64 {
    match (side, current) {
        (_, None) => proposed,
        (Side::Long, Some(c)) => c.min(proposed),
        (Side::Short, Some(c)) => c.max(proposed),
    }
}

#[cfg(test)]
pub(crate) fn make_bar(close: f64) -> Bar {
    Bar {
        time: crate::domain::test_support::ts(1),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
    }
}
