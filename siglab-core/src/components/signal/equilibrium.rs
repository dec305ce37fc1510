//! Equilibrium — mean reversion on the smoothed gap between price and its average.
//!
//! `dk = EMA(smooth(price) - price, period)`. A Short fires when dk rises above
//! `+threshold` after two bars below it; a Long mirrors at `-threshold`.

use serde_json::json;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, Side};
use crate::indicators::{ema, smooth, SmoothingKind};

use super::{price, two_bar_trigger, ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct Equilibrium {
    pub period: usize,
    pub threshold: f64,
    pub smoother: SmoothingKind,
}

impl Equilibrium {
    pub fn new(period: usize, threshold: f64, smoother: SmoothingKind) -> Result<Self, ConfigError> {
        if period == 0 {
            return Err(ConfigError::new("equilibrium", "period must be >= 1"));
        }
        Ok(Self {
            period,
            threshold,
            smoother,
        })
    }

    /// The equilibrium oscillator aligned with `prices`.
    pub fn indicator(&self, prices: &[f64]) -> Vec<f64> {
        let base = smooth(prices, self.period, self.smoother);
        let gap: Vec<f64> = base.iter().zip(prices).map(|(b, c)| b - c).collect();
        ema(&gap, self.period)
    }
}

impl SignalGenerator for Equilibrium {
    fn name(&self) -> &str {
        "equilibrium"
    }

    fn params(&self) -> Params {
        Params::from([
            ("period".to_string(), json!(self.period)),
            ("threshold".to_string(), json!(self.threshold)),
            ("smoother".to_string(), json!(self.smoother.as_str())),
        ])
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        let dk = self.indicator(price(data, ctx)?);
        let th = self.threshold;
        let index = data.index();
        let at = |positions: Vec<usize>| positions.into_iter().map(|t| index[t]).collect::<Vec<_>>();

        let shorts = at(two_bar_trigger(&dk, |v| v < th, |v| v > th));
        let longs = at(two_bar_trigger(&dk, |v| v > -th, |v| v < -th));
        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(shorts, Side::Short),
                EventSeries::from_timestamps(longs, Side::Long),
            ],
            MergePolicy::KeepAll,
        ))
    }
}
