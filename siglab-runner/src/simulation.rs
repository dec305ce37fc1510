//! Simulation executor — turns resolved units into backtest results.
//!
//! Units run one at a time, in order. Each unit's signal source is resolved
//! into a concrete [`SignalFrame`] and handed to the engine together with the
//! market data and the unit's tracker. The first failure aborts the batch.

use chrono::NaiveDateTime;
use siglab_core::components::{SignalError, SignalGenerator};
use siglab_core::domain::{Interval, MarketContext, MarketData, SeriesError, SignalFrame, TimeSeries};
use thiserror::Error;
use tracing::info;

use crate::backtest::{BacktestEngine, BacktestRequest, EngineError, SimulationResult};
use crate::progress::Progress;
use crate::setup::{resolve, SetupNode, SignalSource, SimulationUnit};

/// Placeholder timestamps emitted per symbol for units without a signal source.
pub const STUB_POINTS: usize = 100;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{unit}: signal generation failed for {symbol}: {source}")]
    Signal {
        unit: String,
        symbol: String,
        #[source]
        source: SignalError,
    },

    #[error("{unit}: {source}")]
    Engine {
        unit: String,
        #[source]
        source: EngineError,
    },

    #[error("{unit}: {source}")]
    Series {
        unit: String,
        #[source]
        source: SeriesError,
    },
}

/// Run-wide settings shared by every unit.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub broker: String,
    pub spread: f64,
    pub start: Option<NaiveDateTime>,
    pub stop: Option<NaiveDateTime>,
    /// Column generators read prices from.
    pub price_column: String,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            broker: String::new(),
            spread: 0.0,
            start: None,
            stop: None,
            price_column: "close".to_string(),
        }
    }
}

impl SimulationParams {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.stop)
    }
}

/// Resolve `setup` under `project` and run every unit.
pub fn simulate(
    setup: SetupNode,
    project: &str,
    data: &MarketData,
    params: &SimulationParams,
    engine: &dyn BacktestEngine,
    progress: &dyn Progress,
) -> Result<Vec<SimulationResult>, SimulationError> {
    let resolution = resolve(setup, project);
    run_units(resolution.units, data, params, engine, progress)
}

/// Run already-resolved units in order.
pub fn run_units(
    units: Vec<SimulationUnit>,
    data: &MarketData,
    params: &SimulationParams,
    engine: &dyn BacktestEngine,
    progress: &dyn Progress,
) -> Result<Vec<SimulationResult>, SimulationError> {
    let total = units.len();
    let mut results = Vec::with_capacity(total);
    for (i, mut unit) in units.into_iter().enumerate() {
        progress.on_item(unit.name(), i, total);
        info!(unit = %unit, "simulating");
        results.push(run_unit(&mut unit, data, params, engine)?);
    }
    progress.on_done(total);
    Ok(results)
}

fn run_unit(
    unit: &mut SimulationUnit,
    data: &MarketData,
    params: &SimulationParams,
    engine: &dyn BacktestEngine,
) -> Result<SimulationResult, SimulationError> {
    let signals = resolve_signals(unit, data, params)?;
    let exact_timing = matches!(
        unit.signal_source(),
        Some(SignalSource::Generator(g)) if g.uses_exact_timestamp()
    );
    let request = BacktestRequest {
        signals: &signals,
        data,
        broker: &params.broker,
        spread: params.spread,
        name: unit.name(),
        log_executions: true,
        tracker: unit.tracker(),
        exact_timing,
    };
    let mut result = engine.run(request).map_err(|source| SimulationError::Engine {
        unit: unit.name().to_string(),
        source,
    })?;
    result.args = unit.args();
    Ok(result)
}

/// Concrete signals for one unit.
///
/// Generators are narrowed to the run interval when either bound is set, then fitted and
/// asked to predict per symbol. Series are sliced only when both bounds are
/// given. Units without a source get NaN placeholders.
pub fn resolve_signals(
    unit: &mut SimulationUnit,
    data: &MarketData,
    params: &SimulationParams,
) -> Result<SignalFrame, SimulationError> {
    let name = unit.name().to_string();
    match unit.signal_source_mut() {
        Some(SignalSource::Generator(g)) => {
            if params.start.is_some() || params.stop.is_some() {
                g.narrow_to(params.interval());
            }
            let mut out = SignalFrame::new();
            for (symbol, frame) in data {
                let signal_err = |source| SimulationError::Signal {
                    unit: name.clone(),
                    symbol: symbol.clone(),
                    source,
                };
                g.fit(frame, None).map_err(signal_err)?;
                let ctx = MarketContext::new(symbol.as_str(), params.price_column.as_str());
                let events = g.predict(frame, &ctx).map_err(signal_err)?;
                out.insert(symbol.clone(), events.to_series());
            }
            Ok(out)
        }
        Some(SignalSource::Series(frame)) => {
            let interval = params.interval();
            if interval.is_bounded() {
                Ok(frame.iter().map(|(s, ts)| (s.clone(), ts.slice(&interval))).collect())
            } else {
                Ok(frame.clone())
            }
        }
        None => stub_signals(data, params.start, params.stop)
            .map_err(|source| SimulationError::Series { unit: name, source }),
    }
}

/// Up to [`STUB_POINTS`] evenly spaced NaN placeholders per symbol, spanning
/// the symbol's bars inside `[start, stop]` with first and last included.
/// Missing bounds default to the symbol's first and last timestamp.
pub fn stub_signals(
    data: &MarketData,
    start: Option<NaiveDateTime>,
    stop: Option<NaiveDateTime>,
) -> Result<SignalFrame, SeriesError> {
    let interval = Interval::new(start, stop);
    let mut out = SignalFrame::new();
    for (symbol, frame) in data {
        let index = &frame.index()[interval.positions(frame.index())];
        out.insert(symbol.clone(), TimeSeries::constant(spread_points(index), f64::NAN)?);
    }
    Ok(out)
}

fn spread_points(index: &[NaiveDateTime]) -> Vec<NaiveDateTime> {
    let n = index.len();
    if n <= STUB_POINTS {
        return index.to_vec();
    }
    (0..STUB_POINTS)
        .map(|i| index[i * (n - 1) / (STUB_POINTS - 1)])
        .collect()
}
