//! End-to-end tests: TOML file → simulation → file store → manager → report.
//!
//! Tests:
//! 1. A nested TOML setup runs every unit and stores one artifact per unit.
//! 2. Performance is computed once, persisted, and recomputed only when forced.
//! 3. The comparison report ranks every stored unit and exports to CSV.
//! 4. Deleting through the manager removes files and the index entry.
//! 5. A second batch under the same run id continues the sequence.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use siglab_core::data::{random_walk, write_csv, WalkParams};
use siglab_runner::{
    make_run_id, simulate, store_results, FileStore, FillReason, RunStore, SignalBacktester, SilentProgress,
    SimulationConfig, SimulationResult, SimulationsManager,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

const SETUP: &str = r#"
project = "walks"
data = "data"
start = "2024-01-05"
stop = "30d"
spread = 0.01
commissions = 0.0005
initial_cash = 1000.0

[setup.cross]
signal = { type = "crossing_movings", fast = 5, slow = 20 }
tracker = { type = "time_exit", max_bars = 12 }

[setup.oscillators]
rsi = { type = "rsi_cross", period = 14, lower = 30, upper = 70 }
eq = { type = "equilibrium", period = 10, threshold = 0.3 }

[setup.bare]
stop = { type = "fixed_stop", stop_pct = 0.02 }
"#;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn write_project(dir: &Path) {
    let data = dir.join("data");
    fs::create_dir_all(&data).unwrap();
    for (i, symbol) in ["AAA", "BBB"].iter().enumerate() {
        let frame = random_walk(&WalkParams::hourly(start(), 1500, 7 + i as u64)).unwrap();
        write_csv(&frame, &data.join(format!("{symbol}.csv"))).unwrap();
    }
    fs::write(dir.join("sim.toml"), SETUP).unwrap();
}

fn run(dir: &Path) -> (SimulationConfig, String, Vec<SimulationResult>) {
    let (cfg, text) = SimulationConfig::load(&dir.join("sim.toml")).unwrap();
    let params = cfg.params().unwrap();
    let data = cfg.market_data(dir).unwrap();
    let setup = cfg.setup_node(dir).unwrap();
    let engine = SignalBacktester::new(cfg.position_size);
    let results = simulate(setup, &cfg.project, &data, &params, &engine, &SilentProgress).unwrap();
    (cfg, text, results)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn nested_setup_runs_every_unit() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let (_, _, results) = run(dir.path());

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["walks/cross", "walks/oscillators/rsi", "walks/oscillators/eq", "walks/bare/stop"]
    );
    for r in &results {
        assert_eq!(r.symbols, vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(r.spread, 0.01);
    }
    assert!(!results[0].executions.is_empty());
    // Placeholder signals never trade.
    assert!(results[3].executions.is_empty());

    // Signal fills fall inside the run window; tracker exits may trail it.
    let lo = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let hi = lo + chrono::Duration::days(30) + chrono::Duration::hours(1);
    let signal_fills = results
        .iter()
        .flat_map(|r| &r.executions)
        .filter(|e| e.reason == FillReason::Signal);
    for e in signal_fills {
        assert!(e.time >= lo && e.time <= hi, "{} outside the window", e.time);
    }
}

#[test]
fn stored_runs_round_trip_through_the_manager() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let (cfg, text, results) = run(dir.path());

    let store = FileStore::new(dir.path().join("store"));
    let run_id = make_run_id(&text, start());
    let keys = store_results(&store, &cfg.project, &run_id, &results).unwrap();
    assert_eq!(keys.len(), 4);
    assert_eq!(keys[0], format!("runs/walks/{run_id}/0.AAA+BBB"));

    let manager = SimulationsManager::new(&store).unwrap();
    assert_eq!(manager.projects(), vec!["walks"]);
    assert_eq!(manager.runs_for("walks").unwrap(), vec![run_id.as_str()]);

    let run = manager.run_data("walks", &run_id).unwrap();
    let loaded = run.results().unwrap();
    assert_eq!(loaded.results, results);

    let batch = run.calc_performance(cfg.initial_cash, cfg.commissions, false, &SilentProgress);
    assert_eq!((batch.computed, batch.skipped, batch.failed.len()), (4, 0, 0));
    let again = run.calc_performance(cfg.initial_cash, cfg.commissions, false, &SilentProgress);
    assert_eq!((again.computed, again.skipped), (0, 4));
    let forced = run.calc_performance(cfg.initial_cash, cfg.commissions, true, &SilentProgress);
    assert_eq!(forced.computed, 4);

    let stored = run.load(0).unwrap().unwrap();
    let summary = stored.performance.unwrap();
    assert_eq!(summary.n_execs, results[0].executions.len());
}

#[test]
fn report_ranks_every_unit_and_exports_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let (cfg, text, results) = run(dir.path());
    let store = FileStore::new(dir.path().join("store"));
    let run_id = make_run_id(&text, start());
    store_results(&store, &cfg.project, &run_id, &results).unwrap();

    let manager = SimulationsManager::new(&store).unwrap();
    let run = manager.run_data("walks", &run_id).unwrap();
    assert!(run.comparison_report().unwrap().is_empty());

    run.calc_performance(cfg.initial_cash, cfg.commissions, false, &SilentProgress);
    let report = run.comparison_report().unwrap();
    assert_eq!(report.len(), 4);
    let sharpes: Vec<f64> = report.rows.iter().map(|r| r.sharpe).collect();
    assert!(sharpes.windows(2).all(|w| w[0] >= w[1]));

    let csv_path = dir.path().join("report.csv");
    report.to_csv_path(&csv_path).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("task,sharpe,gain,cagr_pct,dd_usd,dd_pct,n_execs,"));
    assert!(header.contains("tracker.max_bars"));
    assert_eq!(text.lines().count(), 5);
}

#[test]
fn delete_run_removes_files_and_index_entry() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let (cfg, text, results) = run(dir.path());
    let store = FileStore::new(dir.path().join("store"));
    let run_id = make_run_id(&text, start());
    store_results(&store, &cfg.project, &run_id, &results).unwrap();

    let mut manager = SimulationsManager::new(&store).unwrap();
    assert_eq!(manager.delete_run("walks", &run_id).unwrap(), 4);
    assert!(manager.projects().is_empty());
    assert!(store.list("runs/").unwrap().is_empty());
    assert!(manager.run_data("walks", &run_id).is_err());
}

#[test]
fn second_batch_continues_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let (cfg, _, results) = run(dir.path());
    let store = FileStore::new(dir.path().join("store"));

    store_results(&store, &cfg.project, "fixed", &results[..2]).unwrap();
    let keys = store_results(&store, &cfg.project, "fixed", &results[2..]).unwrap();
    assert_eq!(keys, vec!["runs/walks/fixed/2.AAA+BBB", "runs/walks/fixed/3.AAA+BBB"]);

    let manager = SimulationsManager::new(&store).unwrap();
    let run = manager.run_data("walks", "fixed").unwrap();
    assert_eq!(run.records().count(), 4);
}
