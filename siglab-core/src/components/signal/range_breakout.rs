//! Range breakout detector — breaks of a rolling channel given as `RangeTop` / `RangeBot`.
//!
//! With OHLC bars, a break that is already visible at the open fires at the bar
//! timestamp; a break confirmed only by the close fires just before the bar
//! closes (bar timestamp + bar duration - pre-close offset). Without OHLC
//! columns the detector falls back to tick data and compares `ask` / `bid`
//! against the widened bands.

use chrono::{Duration, NaiveDateTime};
use serde_json::json;
use tracing::debug;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, SchemaError, Side};

use super::{ConfigError, Params, SignalError, SignalGenerator};

const OHLC_COLUMNS: [&str; 6] = ["RangeTop", "RangeBot", "open", "high", "low", "close"];
const TICK_COLUMNS: [&str; 4] = ["RangeTop", "RangeBot", "bid", "ask"];

#[derive(Debug, Clone)]
pub struct RangeBreakoutDetector {
    /// Distance added above `RangeTop` and below `RangeBot`.
    pub threshold: f64,
    /// How long before the bar close a close-confirmed break is stamped.
    pub pre_close_offset: Duration,
}

impl RangeBreakoutDetector {
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        Self::with_pre_close_offset(threshold, Duration::seconds(1))
    }

    pub fn with_pre_close_offset(threshold: f64, pre_close_offset: Duration) -> Result<Self, ConfigError> {
        if !threshold.is_finite() {
            return Err(ConfigError::new("range_breakout", "threshold must be finite"));
        }
        if pre_close_offset < Duration::zero() {
            return Err(ConfigError::new(
                "range_breakout",
                "pre_close_offset must not be negative",
            ));
        }
        Ok(Self {
            threshold,
            pre_close_offset,
        })
    }

    fn bands(&self, data: &Frame) -> Result<(Vec<f64>, Vec<f64>), SchemaError> {
        let upper = data.column("RangeTop")?.iter().map(|v| v + self.threshold).collect();
        let lower = data.column("RangeBot")?.iter().map(|v| v - self.threshold).collect();
        Ok((upper, lower))
    }

    fn ohlc_breaks(&self, data: &Frame) -> Result<EventSeries, SchemaError> {
        let (u, b) = self.bands(data)?;
        let open = data.column("open")?;
        let high = data.column("high")?;
        let low = data.column("low")?;
        let close = data.column("close")?;
        let index = data.index();
        let shift = data
            .bar_duration()
            .map(|d| d - self.pre_close_offset)
            .unwrap_or_else(Duration::zero);

        let mut long_open = Vec::new();
        let mut long_close = Vec::new();
        let mut short_open = Vec::new();
        let mut short_close = Vec::new();

        for t in 0..index.len() {
            // Previous bar stayed inside the band; false on the first bar.
            let inside_top = t > 0 && high[t - 1] <= u[t - 1];
            let inside_bot = t > 0 && low[t - 1] >= b[t - 1];

            let l_open = inside_top && open[t] > u[t];
            let s_open = inside_bot && open[t] < b[t];
            let l_close = (inside_top || open[t] <= u[t]) && close[t] > u[t];
            let s_close = (inside_bot || open[t] >= b[t]) && close[t] < b[t];

            if l_open {
                long_open.push(index[t]);
            } else if l_close {
                long_close.push(index[t] + shift);
            }
            if s_open {
                short_open.push(index[t]);
            } else if s_close {
                short_close.push(index[t] + shift);
            }
        }

        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(long_open, Side::Long),
                EventSeries::from_timestamps(long_close, Side::Long),
                EventSeries::from_timestamps(short_open, Side::Short),
                EventSeries::from_timestamps(short_close, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }

    fn tick_breaks(&self, data: &Frame) -> Result<EventSeries, SchemaError> {
        let (u, b) = self.bands(data)?;
        let ask = data.column("ask")?;
        let bid = data.column("bid")?;
        let index = data.index();

        let up: Vec<NaiveDateTime> = (1..index.len())
            .filter(|&t| ask[t - 1] <= u[t - 1] && ask[t] > u[t])
            .map(|t| index[t])
            .collect();
        let down: Vec<NaiveDateTime> = (1..index.len())
            .filter(|&t| bid[t - 1] >= b[t - 1] && bid[t] < b[t])
            .map(|t| index[t])
            .collect();

        Ok(EventSeries::merge(
            [
                EventSeries::from_timestamps(up, Side::Long),
                EventSeries::from_timestamps(down, Side::Short),
            ],
            MergePolicy::KeepAll,
        ))
    }
}

impl SignalGenerator for RangeBreakoutDetector {
    fn name(&self) -> &str {
        "range_breakout"
    }

    fn params(&self) -> Params {
        Params::from([
            ("threshold".to_string(), json!(self.threshold)),
            (
                "pre_close_offset_ms".to_string(),
                json!(self.pre_close_offset.num_milliseconds()),
            ),
        ])
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        match data.require(&OHLC_COLUMNS) {
            Ok(()) => Ok(self.ohlc_breaks(data)?),
            Err(missing) => {
                debug!(symbol = %ctx.symbol, %missing, "no OHLC bars, using tick mode");
                data.require(&TICK_COLUMNS)?;
                Ok(self.tick_breaks(data)?)
            }
        }
    }

    fn uses_exact_timestamp(&self) -> bool {
        true
    }
}
