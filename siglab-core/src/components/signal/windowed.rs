//! Interval-restricted generator.
//!
//! The wrapped generator still sees the full frame, so indicators warm up on
//! history before the window opens; only the events it emits are clipped.

use crate::domain::{EventSeries, Frame, Interval, MarketContext, TimeSeries};

use super::{Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct Windowed<G> {
    inner: G,
    interval: Interval,
}

impl<G: SignalGenerator> Windowed<G> {
    /// Unbounded until narrowed.
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            interval: Interval::unbounded(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: SignalGenerator> SignalGenerator for Windowed<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn params(&self) -> Params {
        self.inner.params()
    }

    fn fit(&mut self, history: &Frame, target: Option<&TimeSeries<f64>>) -> Result<(), SignalError> {
        self.inner.fit(history, target)
    }

    fn predict(&self, data: &Frame, ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        Ok(self.inner.predict(data, ctx)?.slice(&self.interval))
    }

    fn uses_exact_timestamp(&self) -> bool {
        self.inner.uses_exact_timestamp()
    }

    fn narrow_to(&mut self, interval: Interval) {
        self.interval = interval;
    }
}
