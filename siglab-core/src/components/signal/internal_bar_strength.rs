//! Internal bar strength — mean reversion on where the close sits inside the bar.
//!
//! Bars are resampled to `timeframe` in the configured timezone. IBS of the
//! previous resampled bar is published at the next bar's open:
//! Long when IBS < threshold, Short when IBS > 1 - threshold.

use chrono::FixedOffset;
use serde_json::json;

use crate::domain::{
    parse_offset, resample_ohlc, EventSeries, Frame, MarketContext, MergePolicy, Side, Timeframe,
};

use super::{ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct InternalBarStrength {
    timeframe: Timeframe,
    timeframe_label: String,
    pub threshold: f64,
    tz: String,
    offset: FixedOffset,
}

impl InternalBarStrength {
    pub fn new(timeframe: &str, threshold: f64, tz: &str) -> Result<Self, ConfigError> {
        if !(threshold > 0.0 && threshold < 0.5) {
            return Err(ConfigError::new(
                "internal_bar_strength",
                format!("threshold {threshold} must lie in (0, 0.5)"),
            ));
        }
        let parsed = Timeframe::parse(timeframe)
            .map_err(|e| ConfigError::new("internal_bar_strength", e.to_string()))?;
        let offset =
            parse_offset(tz).map_err(|e| ConfigError::new("internal_bar_strength", e.to_string()))?;
        Ok(Self {
            timeframe: parsed,
            timeframe_label: timeframe.to_string(),
            threshold,
            tz: tz.to_string(),
            offset,
        })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }
}

impl SignalGenerator for InternalBarStrength {
    fn name(&self) -> &str {
        "internal_bar_strength"
    }

    fn params(&self) -> Params {
        Params::from([
            ("timeframe".to_string(), json!(self.timeframe_label)),
            ("threshold".to_string(), json!(self.threshold)),
            ("tz".to_string(), json!(self.tz)),
        ])
    }

    fn predict(&self, data: &Frame, _ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        data.require(&["open", "close", "high", "low"])?;
        let bars = resample_ohlc(data, self.timeframe, self.offset)?;
        let high = bars.column("high")?;
        let low = bars.column("low")?;
        let close = bars.column("close")?;
        let index = bars.index();

        let mut longs = Vec::new();
        let mut shorts = Vec::new();
        for k in 1..index.len() {
            let ibs = (close[k - 1] - low[k - 1]) / (high[k - 1] - low[k - 1]);
            if ibs < self.threshold {
                longs.push(index[k]);
            } else if ibs > 1.0 - self.threshold {
                shorts.push(index[k]);
            }
        }
        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(longs, Side::Long),
                EventSeries::from_timestamps(shorts, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }

    fn uses_exact_timestamp(&self) -> bool {
        true
    }
}
