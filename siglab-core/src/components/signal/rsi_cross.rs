//! RSI entries — Long when RSI climbs out of oversold, Short when it falls out of overbought.

use serde_json::json;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, Side};
use crate::edge::{cross_down, cross_up};
use crate::indicators::{rsi, SmoothingKind};

use super::{price, ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct RsiCross {
    pub period: usize,
    pub lower: f64,
    pub upper: f64,
    pub smoother: SmoothingKind,
}

impl RsiCross {
    pub fn new(period: usize, lower: f64, upper: f64, smoother: SmoothingKind) -> Result<Self, ConfigError> {
        if period == 0 {
            return Err(ConfigError::new("rsi_cross", "period must be >= 1"));
        }
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) {
            return Err(ConfigError::new("rsi_cross", "levels must lie in [0, 100]"));
        }
        Ok(Self {
            period,
            lower,
            upper,
            smoother,
        })
    }

    /// Levels 25 / 75, SMA smoothing.
    pub fn with_defaults(period: usize) -> Result<Self, ConfigError> {
        Self::new(period, 25.0, 75.0, SmoothingKind::Sma)
    }
}

impl SignalGenerator for RsiCross {
    fn name(&self) -> &str {
        "rsi_cross"
    }

    fn params(&self) -> Params {
        Params::from([
            ("period".to_string(), json!(self.period)),
            ("lower".to_string(), json!(self.lower)),
            ("upper".to_string(), json!(self.upper)),
            ("smoother".to_string(), json!(self.smoother.as_str())),
        ])
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        let r = rsi(price(data, ctx)?, self.period, self.smoother);
        let index = data.index();
        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(cross_up(index, &r, self.lower.into())?, Side::Long),
                EventSeries::from_timestamps(cross_down(index, &r, self.upper.into())?, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }
}
