//! Backtest engine seam and the reference signal backtester.
//!
//! The executor hands an engine a resolved [`SignalFrame`] together with the
//! market data and an optional tracker. [`SignalBacktester`] holds at most one
//! fixed-size position per symbol and marks it to market at every bar close.
//!
//! Fill timing:
//! - deferred signals fill at the open of the first bar strictly after them;
//! - exact-time signals fill at the open of the bar stamped with the same
//!   instant, otherwise at the close of the bar they fall inside.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use siglab_core::components::tracker::{ratchet_stop, ratchet_target};
use siglab_core::components::{Params, Tracker, TrackerAction};
use siglab_core::domain::{
    Bar, Frame, MarketData, OpenPosition, SchemaError, SeriesError, Side, SignalFrame, TimeSeries,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::performance::PerformanceSummary;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{symbol}: {source}")]
    Schema {
        symbol: String,
        #[source]
        source: SchemaError,
    },

    #[error("invalid spread {0}: must be finite and non-negative")]
    Spread(f64),

    #[error("equity curve: {0}")]
    Series(#[from] SeriesError),
}

/// Everything an engine needs for one simulation unit.
#[derive(Debug, Clone, Copy)]
pub struct BacktestRequest<'a> {
    pub signals: &'a SignalFrame,
    pub data: &'a MarketData,
    pub broker: &'a str,
    /// Full bid/ask spread in price units; each fill pays half.
    pub spread: f64,
    pub name: &'a str,
    pub log_executions: bool,
    pub tracker: Option<&'a dyn Tracker>,
    /// Signals carry their exact execution instant.
    pub exact_timing: bool,
}

pub trait BacktestEngine {
    fn run(&self, request: BacktestRequest<'_>) -> Result<SimulationResult, EngineError>;
}

/// Why a fill happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReason {
    Signal,
    Stop,
    Target,
    TrackerExit,
}

/// One executed trade. `quantity` is signed: positive buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub time: NaiveDateTime,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub reason: FillReason,
}

impl Execution {
    pub fn notional(&self) -> f64 {
        (self.quantity * self.price).abs()
    }
}

/// Output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub name: String,
    pub broker: String,
    pub spread: f64,
    pub symbols: Vec<String>,
    /// Free-form arguments of the unit that produced this result.
    #[serde(default)]
    pub args: Params,
    /// Sorted by time.
    pub executions: Vec<Execution>,
    /// Mark-to-market PnL before commissions, summed over symbols.
    pub pnl: TimeSeries<f64>,
}

impl SimulationResult {
    /// PnL after charging `commissions` (a fraction of traded notional) on every execution.
    pub fn equity(&self, commissions: f64) -> TimeSeries<f64> {
        let mut fills = self.executions.iter().peekable();
        let mut charged = 0.0;
        self.pnl.map(|t, &v| {
            while let Some(e) = fills.next_if(|e| e.time <= t) {
                charged += commissions * e.notional();
            }
            v - charged
        })
    }

    pub fn performance(&self, initial_cash: f64, commissions: f64) -> PerformanceSummary {
        PerformanceSummary::compute(&self.equity(commissions), initial_cash, self.executions.len())
    }
}

/// Reference engine: unit-sized positions driven by signal signs.
#[derive(Debug, Clone, Copy)]
pub struct SignalBacktester {
    pub position_size: f64,
}

impl Default for SignalBacktester {
    fn default() -> Self {
        Self { position_size: 1.0 }
    }
}

impl SignalBacktester {
    pub fn new(position_size: f64) -> Self {
        Self { position_size }
    }
}

impl BacktestEngine for SignalBacktester {
    fn run(&self, req: BacktestRequest<'_>) -> Result<SimulationResult, EngineError> {
        if !(req.spread.is_finite() && req.spread >= 0.0) {
            return Err(EngineError::Spread(req.spread));
        }
        for symbol in req.signals.keys().filter(|s| !req.data.contains_key(*s)) {
            warn!(name = req.name, %symbol, "signals for a symbol without market data");
        }

        let mut executions = Vec::new();
        let mut deltas: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
        let mut symbols = Vec::new();

        for (symbol, frame) in req.data {
            let Some(signals) = req.signals.get(symbol) else {
                continue;
            };
            let book = self.run_symbol(symbol, frame, signals, &req)?;
            let mut previous = 0.0;
            for (t, value) in book.marks {
                *deltas.entry(t).or_default() += value - previous;
                previous = value;
            }
            executions.extend(book.executions);
            symbols.push(symbol.clone());
        }
        executions.sort_by_key(|e| e.time);

        let mut acc = 0.0;
        let (index, values): (Vec<_>, Vec<_>) = deltas
            .into_iter()
            .map(|(t, d)| {
                acc += d;
                (t, acc)
            })
            .unzip();

        Ok(SimulationResult {
            name: req.name.to_string(),
            broker: req.broker.to_string(),
            spread: req.spread,
            symbols,
            args: Params::new(),
            executions,
            pnl: TimeSeries::new(index, values)?,
        })
    }
}

impl SignalBacktester {
    fn run_symbol(
        &self,
        symbol: &str,
        frame: &Frame,
        signals: &TimeSeries<f64>,
        req: &BacktestRequest<'_>,
    ) -> Result<SymbolBook, EngineError> {
        let schema = |source| EngineError::Schema {
            symbol: symbol.to_string(),
            source,
        };
        frame.require(&["open", "close"]).map_err(schema)?;
        let open = frame.column("open").map_err(schema)?;
        let close = frame.column("close").map_err(schema)?;
        let high = frame.column("high").unwrap_or(close);
        let low = frame.column("low").unwrap_or(close);
        let index = frame.index();
        let (at_open, at_close) = schedule(index, signals, req.exact_timing);

        let mut book = SymbolBook::new(symbol, self.position_size, req.spread / 2.0, req.log_executions);
        let mut last_close = f64::NAN;

        for t in 0..index.len() {
            let bar = Bar {
                time: index[t],
                open: open[t],
                high: high[t],
                low: low[t],
                close: close[t],
            };
            if let Some(target) = at_open[t] {
                book.fill(target, bar.open, bar.time, FillReason::Signal);
            }
            if let Some(tracker) = req.tracker {
                book.manage(tracker, &bar);
            }
            if let Some(target) = at_close[t] {
                book.fill(target, bar.close, bar.time, FillReason::Signal);
            }
            if bar.close.is_finite() {
                last_close = bar.close;
            }
            book.mark(bar.time, last_close);
        }
        Ok(book)
    }
}

/// Per-bar target sides: fills at the open and fills at the close. Last signal wins a slot.
fn schedule(
    index: &[NaiveDateTime],
    signals: &TimeSeries<f64>,
    exact: bool,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = index.len();
    let mut at_open = vec![None; n];
    let mut at_close = vec![None; n];
    for (ts, &value) in signals.iter() {
        if value.is_nan() {
            continue;
        }
        let target = if value > 0.0 {
            1.0
        } else if value < 0.0 {
            -1.0
        } else {
            0.0
        };
        if exact {
            let p = index.partition_point(|t| *t < ts);
            if p < n && index[p] == ts {
                at_open[p] = Some(target);
            } else if p > 0 {
                at_close[p - 1] = Some(target);
            }
        } else {
            let p = index.partition_point(|t| *t <= ts);
            if p < n {
                at_open[p] = Some(target);
            }
        }
    }
    (at_open, at_close)
}

struct SymbolBook {
    symbol: String,
    size: f64,
    half_spread: f64,
    log: bool,
    quantity: f64,
    cash: f64,
    position: Option<OpenPosition>,
    executions: Vec<Execution>,
    marks: Vec<(NaiveDateTime, f64)>,
}

impl SymbolBook {
    fn new(symbol: &str, size: f64, half_spread: f64, log: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            size,
            half_spread,
            log,
            quantity: 0.0,
            cash: 0.0,
            position: None,
            executions: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Move to `target` (-1, 0, +1) position units at `price`.
    fn fill(&mut self, target: f64, price: f64, time: NaiveDateTime, reason: FillReason) {
        if !price.is_finite() {
            return;
        }
        let delta = target * self.size - self.quantity;
        if delta == 0.0 {
            return;
        }
        let fill_price = price + delta.signum() * self.half_spread;
        self.cash -= delta * fill_price;
        self.quantity += delta;
        if self.log {
            debug!(symbol = %self.symbol, %time, quantity = delta, price = fill_price, ?reason, "execution");
        }
        self.executions.push(Execution {
            time,
            symbol: self.symbol.clone(),
            quantity: delta,
            price: fill_price,
            reason,
        });
        self.position = Side::from_value(target).map(|side| match self.position.take() {
            Some(p) if p.side == side => p,
            _ => OpenPosition::new(side, fill_price, time),
        });
    }

    /// Stop/target hits within the bar, then the tracker's verdict at the close.
    fn manage(&mut self, tracker: &dyn Tracker, bar: &Bar) {
        let Some(position) = self.position.as_mut() else {
            return;
        };
        position.observe(bar);
        if let Some((price, reason)) = level_hit(position, bar) {
            self.fill(0.0, price, bar.time, reason);
            return;
        }
        match tracker.on_bar(position, bar) {
            TrackerAction::Hold => {}
            TrackerAction::Update { stop, target } => {
                if let Some(s) = stop {
                    position.stop = Some(ratchet_stop(position.side, position.stop, s));
                }
                if let Some(g) = target {
                    position.target = Some(ratchet_target(position.side, position.target, g));
                }
            }
            TrackerAction::Exit => self.fill(0.0, bar.close, bar.time, FillReason::TrackerExit),
        }
    }

    fn mark(&mut self, time: NaiveDateTime, price: f64) {
        let value = if self.quantity == 0.0 {
            self.cash
        } else if price.is_finite() {
            self.cash + self.quantity * price
        } else {
            return;
        };
        self.marks.push((time, value));
    }
}

/// Price at which a standing stop or target is hit inside `bar`; gaps fill at the open.
fn level_hit(position: &OpenPosition, bar: &Bar) -> Option<(f64, FillReason)> {
    match position.side {
        Side::Long => {
            if let Some(s) = position.stop.filter(|s| bar.low <= *s) {
                return Some((bar.open.min(s), FillReason::Stop));
            }
            position
                .target
                .filter(|g| bar.high >= *g)
                .map(|g| (bar.open.max(g), FillReason::Target))
        }
        Side::Short => {
            if let Some(s) = position.stop.filter(|s| bar.high >= *s) {
                return Some((bar.open.max(s), FillReason::Stop));
            }
            position
                .target
                .filter(|g| bar.low <= *g)
                .map(|g| (bar.open.min(g), FillReason::Target))
        }
    }
}
