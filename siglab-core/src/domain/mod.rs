//! Domain types for SigLab: time series, events, market frames, intervals and timeframes.

pub mod bar;
pub mod events;
pub mod frame;
pub mod interval;
pub mod series;
pub mod timeframe;

#[cfg(test)]
pub(crate) mod test_support;

pub use bar::{Bar, OpenPosition};
pub use events::{EventSeries, MergePolicy, Side};
pub use frame::{Frame, FrameError, MarketContext, MarketData, SchemaError};
pub use interval::Interval;
pub use series::{SeriesError, SignalFrame, TimeSeries};
pub use timeframe::{parse_offset, resample_ohlc, Timeframe, TimeframeError};

/// Symbol type alias
pub type Symbol = String;
