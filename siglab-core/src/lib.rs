//! SigLab Core — time series, edge detection, signal generators, trackers.
//!
//! This crate contains the signal side of the research loop:
//! - Domain types (time series, event series, market frames, intervals, timeframes)
//! - Edge detection (threshold crossings over aligned series)
//! - Smoothing and oscillator primitives
//! - Seven signal generators plus an interval-windowing wrapper
//! - Trackers (position management policies) with the ratchet invariant
//! - A factory that builds components from a type name and parameters
//! - CSV / Parquet loaders and a synthetic random walk

pub mod components;
pub mod data;
pub mod domain;
pub mod edge;
pub mod indicators;

pub use components::{
    create_signal, create_tracker, ComponentKind, ComponentSpec, ConfigError, FactoryError, Params,
    SignalError, SignalGenerator, Tracker, TrackerAction,
};
pub use domain::{
    EventSeries, Frame, Interval, MarketContext, MarketData, MergePolicy, SchemaError, Side,
    SignalFrame, TimeSeries,
};
