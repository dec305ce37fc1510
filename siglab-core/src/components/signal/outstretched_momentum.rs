//! Outstretched momentum — a contrarian oscillator on stretched runs of closes.
//!
//! raw[t] = #(c > c[-period]) - #(c < c[-period]) over the last `period` bars,
//! osi = EMA(raw, smoothing). With `k = period * (1 - threshold)`, a Long fires
//! when osi reaches `-k` after two bars above it; a Short mirrors at `+k`.

use serde_json::json;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, Side};
use crate::indicators::{ema, rolling_sum, shift};

use super::{price, two_bar_trigger, ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct OutstretchedMomentum {
    pub period: usize,
    pub smoothing: usize,
    pub threshold: f64,
}

impl OutstretchedMomentum {
    pub fn new(period: usize, smoothing: usize, threshold: f64) -> Result<Self, ConfigError> {
        if threshold > 1.0 {
            return Err(ConfigError::new(
                "outstretched_momentum",
                format!("threshold {threshold} exceeds 1"),
            ));
        }
        if period == 0 || smoothing == 0 {
            return Err(ConfigError::new(
                "outstretched_momentum",
                "period and smoothing must be >= 1",
            ));
        }
        Ok(Self {
            period,
            smoothing,
            threshold,
        })
    }

    /// Smoothed outstretch indicator aligned with `prices`.
    pub fn indicator(&self, prices: &[f64]) -> Vec<f64> {
        let lagged = shift(prices, self.period);
        let stretch = |f: fn(f64, f64) -> bool| -> Vec<f64> {
            prices
                .iter()
                .zip(&lagged)
                .map(|(&c, &l)| if f(c, l) { 1.0 } else { 0.0 })
                .collect()
        };
        let pos = rolling_sum(&stretch(|c, l| c > l), self.period);
        let neg = rolling_sum(&stretch(|c, l| c < l), self.period);
        let raw: Vec<f64> = pos.iter().zip(&neg).map(|(p, n)| p - n).collect();
        ema(&raw, self.smoothing)
    }
}

impl SignalGenerator for OutstretchedMomentum {
    fn name(&self) -> &str {
        "outstretched_momentum"
    }

    fn params(&self) -> Params {
        Params::from([
            ("period".to_string(), json!(self.period)),
            ("smoothing".to_string(), json!(self.smoothing)),
            ("threshold".to_string(), json!(self.threshold)),
        ])
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        let osi = self.indicator(price(data, ctx)?);
        let k = self.period as f64 * (1.0 - self.threshold);
        let index = data.index();
        let at = |positions: Vec<usize>| positions.into_iter().map(|t| index[t]).collect::<Vec<_>>();

        let longs = at(two_bar_trigger(&osi, |v| v > -k, |v| v <= -k));
        let shorts = at(two_bar_trigger(&osi, |v| v < k, |v| v >= k));
        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(longs, Side::Long),
                EventSeries::from_timestamps(shorts, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }
}
