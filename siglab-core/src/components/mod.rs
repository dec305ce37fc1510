//! Components — signal generators, trackers and the factory that builds them by name.
//!
//! - Signal generator: turns market data into +1 / -1 events
//! - Tracker: manages a position once a signal has opened it

pub mod factory;
pub mod signal;
pub mod tracker;

pub use factory::{
    component_kind, create_signal, create_tracker, ComponentKind, ComponentSpec, FactoryError,
};
pub use signal::{ConfigError, Params, SignalError, SignalGenerator};
pub use tracker::{Tracker, TrackerAction};
