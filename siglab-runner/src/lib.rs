//! SigLab Runner — setup resolution, simulation, run storage and reporting.
//!
//! This crate builds on `siglab-core` to provide:
//! - Setup resolution: nested setups flattened into named simulation units
//! - The simulation executor and a reference backtest engine
//! - Performance metrics over a result's equity curve
//! - Run storage behind a key/value trait, with file and in-memory stores
//! - A results manager with performance caching and comparison reports
//! - TOML simulation files

pub mod backtest;
pub mod config;
pub mod manager;
pub mod performance;
pub mod progress;
pub mod report;
pub mod setup;
pub mod simulation;
pub mod store;

pub use backtest::{
    BacktestEngine, BacktestRequest, EngineError, Execution, FillReason, SignalBacktester,
    SimulationResult,
};
pub use config::{SetupConfigError, SimulationConfig};
pub use manager::{
    ManagerError, MultiResults, PerformanceBatch, RunRecord, SimulationRunData, SimulationsManager,
};
pub use performance::PerformanceSummary;
pub use progress::{Progress, SilentProgress, StdoutProgress};
pub use report::{ComparisonReport, ReportError, ReportRow};
pub use setup::{resolve, NodeKind, Resolution, SetupNode, SignalSource, SimulationUnit, SkippedNode};
pub use simulation::{run_units, simulate, SimulationError, SimulationParams};
pub use store::{
    make_run_id, store_results, FileStore, MemoryStore, RunArtifact, RunKey, RunStore, StoreError,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn artifacts_are_send_sync() {
        assert_send::<RunArtifact>();
        assert_sync::<RunArtifact>();
        assert_send::<SimulationResult>();
        assert_sync::<SimulationResult>();
        assert_send::<PerformanceSummary>();
        assert_sync::<PerformanceSummary>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<FileStore>();
        assert_sync::<FileStore>();
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
    }

    #[test]
    fn units_are_send() {
        assert_send::<SimulationUnit>();
        assert_send::<SetupNode>();
    }
}
