//! Signal generation — turns market data into sparse +1 / -1 event series.
//!
//! Generators are constructed once with their parameters, optionally fitted on
//! history, then asked to predict over a frame. The price column a generator
//! reads comes from the [`MarketContext`] at prediction time, never from the
//! generator itself.

pub mod crossing_movings;
pub mod equilibrium;
pub mod internal_bar_strength;
pub mod outstretched_momentum;
pub mod pivots_breakout;
pub mod range_breakout;
pub mod rsi_cross;
pub mod windowed;

pub use crossing_movings::CrossingMovings;
pub use equilibrium::Equilibrium;
pub use internal_bar_strength::InternalBarStrength;
pub use outstretched_momentum::OutstretchedMomentum;
pub use pivots_breakout::PivotsBreakoutDetector;
pub use range_breakout::RangeBreakoutDetector;
pub use rsi_cross::RsiCross;
pub use windowed::Windowed;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::domain::{
    EventSeries, Frame, FrameError, Interval, MarketContext, SchemaError, TimeSeries,
};
use crate::edge::EdgeError;

/// Parameter snapshot of a component, recorded alongside its results.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Invalid construction parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {component} parameters: {message}")]
pub struct ConfigError {
    pub component: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Edge(#[from] EdgeError),
}

/// Trait for signal generators.
///
/// # Architecture invariant
/// Generators never see positions or fills. `predict` receives only market
/// data and the context it is applied in.
pub trait SignalGenerator: Send + Sync + fmt::Debug {
    /// Short identifier (e.g., "crossing_movings").
    fn name(&self) -> &str;

    /// Construction parameters, for result bookkeeping.
    fn params(&self) -> Params;

    /// Learn from history. None of the shipped generators learn anything.
    fn fit(&mut self, _history: &Frame, _target: Option<&TimeSeries<f64>>) -> Result<(), SignalError> {
        Ok(())
    }

    /// Produce events over `data`.
    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError>;

    /// True when events are stamped with the exact instant they should execute
    /// at, rather than "on the next bar".
    fn uses_exact_timestamp(&self) -> bool {
        false
    }

    /// Restrict output to `interval`. A no-op unless the generator is windowed.
    fn narrow_to(&mut self, _interval: Interval) {}
}

impl SignalGenerator for Box<dyn SignalGenerator> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn params(&self) -> Params {
        (**self).params()
    }

    fn fit(&mut self, history: &Frame, target: Option<&TimeSeries<f64>>) -> Result<(), SignalError> {
        (**self).fit(history, target)
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        (**self).predict(data, ctx)
    }

    fn uses_exact_timestamp(&self) -> bool {
        (**self).uses_exact_timestamp()
    }

    fn narrow_to(&mut self, interval: Interval) {
        (**self).narrow_to(interval)
    }
}

/// Price column named by the context.
pub(crate) fn price<'a>(data: &'a Frame, ctx: &MarketContext) -> Result<&'a [f64], SchemaError> {
    data.column(&ctx.price_column)
}

/// Positions `t >= 2` where the predicate holds for `t-2` and `t-1` but `fire` holds at `t`.
///
/// Used by oscillators that require two bars on one side of a level before the trigger.
pub(crate) fn two_bar_trigger(
    values: &[f64],
    before: impl Fn(f64) -> bool,
    fire: impl Fn(f64) -> bool,
) -> Vec<usize> {
    (2..values.len())
        .filter(|&t| before(values[t - 2]) && before(values[t - 1]) && fire(values[t]))
        .collect()
}
