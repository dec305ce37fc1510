//! Moving average crossover — fast average crossing the slow one.
//!
//! Fires Long when the fast MA crosses above the slow MA and Short when it
//! crosses below.

use serde_json::json;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, Side};
use crate::edge::{cross_down, cross_up, Threshold};
use crate::indicators::{smooth, SmoothingKind};

use super::{price, ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct CrossingMovings {
    pub fast: usize,
    pub slow: usize,
    pub fast_kind: SmoothingKind,
    pub slow_kind: SmoothingKind,
}

impl CrossingMovings {
    pub fn new(
        fast: usize,
        slow: usize,
        fast_kind: SmoothingKind,
        slow_kind: SmoothingKind,
    ) -> Result<Self, ConfigError> {
        if fast == 0 || slow == 0 {
            return Err(ConfigError::new("crossing_movings", "periods must be >= 1"));
        }
        Ok(Self {
            fast,
            slow,
            fast_kind,
            slow_kind,
        })
    }

    /// Simple moving averages on both legs.
    pub fn sma(fast: usize, slow: usize) -> Result<Self, ConfigError> {
        Self::new(fast, slow, SmoothingKind::Sma, SmoothingKind::Sma)
    }
}

impl SignalGenerator for CrossingMovings {
    fn name(&self) -> &str {
        "crossing_movings"
    }

    fn params(&self) -> Params {
        Params::from([
            ("fast".to_string(), json!(self.fast)),
            ("slow".to_string(), json!(self.slow)),
            ("fast_type".to_string(), json!(self.fast_kind.as_str())),
            ("slow_type".to_string(), json!(self.slow_kind.as_str())),
        ])
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        let prices = price(data, ctx)?;
        let fast = smooth(prices, self.fast, self.fast_kind);
        let slow = smooth(prices, self.slow, self.slow_kind);
        let index = data.index();

        let up = cross_up(index, &fast, Threshold::Series(&slow))?;
        let down = cross_down(index, &fast, Threshold::Series(&slow))?;
        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(up, Side::Long),
                EventSeries::from_timestamps(down, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{frame, ts};

    #[test]
    fn golden_and_death_cross() {
        // fast = price (period 1), slow = SMA(3)
        let closes = [10.0, 10.0, 10.0, 12.0, 13.0, 8.0, 7.0];
        let f = frame(&[("close", &closes)]);
        let g = CrossingMovings::sma(1, 3).unwrap();
        let events = g.predict(&f, &MarketContext::new("X", "close")).unwrap();
        // bar 2: 10 vs 10 (touch), bar 3: 12 > 10.67 → up
        assert_eq!(events.timestamps_of(Side::Long), vec![ts(3)]);
        // bar 5: 8 < 11 → down
        assert_eq!(events.timestamps_of(Side::Short), vec![ts(5)]);
        assert!(!g.uses_exact_timestamp());
    }

    #[test]
    fn reads_the_context_price_column() {
        let f = frame(&[("close", &[1.0, 2.0]), ("mid", &[1.0, 2.0])]);
        let g = CrossingMovings::sma(1, 2).unwrap();
        assert!(g.predict(&f, &MarketContext::new("X", "mid")).is_ok());
        assert!(matches!(
            g.predict(&f, &MarketContext::new("X", "bid")),
            Err(SignalError::Schema(_))
        ));
    }

    #[test]
    fn zero_period_rejected() {
        assert!(CrossingMovings::sma(0, 5).is_err());
    }
}
