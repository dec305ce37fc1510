//! SigLab CLI — run simulation setups and work with stored runs.
//!
//! Commands:
//! - `simulate` — run a TOML setup file and store one artifact per unit
//! - `runs` — list projects, or the runs of one project
//! - `performance` — compute performance summaries for a stored run
//! - `report` — print (or export) a run's comparison report
//! - `delete` — remove a stored run
//! - `demo` — write synthetic market data and a sample setup file

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use siglab_core::data::{random_walk, write_csv, WalkParams};
use siglab_runner::{
    make_run_id, resolve, run_units, store_results, FileStore, SignalBacktester, SimulationConfig,
    SimulationsManager, StdoutProgress,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "siglab", about = "SigLab CLI — signal research and simulation runs")]
struct Cli {
    /// Directory holding stored runs.
    #[arg(long, global = true, default_value = "siglab-store")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every unit of a TOML setup file and store the results.
    Simulate {
        /// Path to the setup file.
        config: PathBuf,

        /// Compute performance summaries right after storing.
        #[arg(long, default_value_t = false)]
        performance: bool,
    },
    /// List projects, or the runs of one project.
    Runs {
        project: Option<String>,
    },
    /// Compute performance summaries for a stored run.
    Performance {
        project: String,
        run_id: String,

        #[arg(long, default_value_t = 10_000.0)]
        initial_cash: f64,

        /// Commission as a fraction of traded notional.
        #[arg(long, default_value_t = 0.0)]
        commissions: f64,

        /// Recompute summaries that already exist.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print a run's comparison report, ranked by Sharpe.
    Report {
        project: String,
        run_id: String,

        /// Also write the report as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Delete a stored run.
    Delete { project: String, run_id: String },
    /// Write synthetic market data and a sample setup file.
    Demo {
        /// Output directory.
        #[arg(long, default_value = "demo")]
        out: PathBuf,

        /// Bars per symbol.
        #[arg(long, default_value_t = 2000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store = FileStore::new(&cli.store);

    match cli.command {
        Commands::Simulate { config, performance } => run_simulate(&store, &config, performance),
        Commands::Runs { project } => run_list(&store, project.as_deref()),
        Commands::Performance {
            project,
            run_id,
            initial_cash,
            commissions,
            force,
        } => run_performance(&store, &project, &run_id, initial_cash, commissions, force),
        Commands::Report { project, run_id, csv } => run_report(&store, &project, &run_id, csv.as_deref()),
        Commands::Delete { project, run_id } => run_delete(&store, &project, &run_id),
        Commands::Demo { out, bars, seed } => run_demo(&out, bars, seed),
    }
}

fn run_simulate(store: &FileStore, config_path: &Path, performance: bool) -> Result<()> {
    let started_at = Utc::now().naive_utc();
    let (cfg, text) = SimulationConfig::load(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let params = cfg.params()?;
    let data = cfg.market_data(base_dir)?;
    if data.is_empty() {
        bail!("no market data found at {}", base_dir.join(&cfg.data).display());
    }

    let resolution = resolve(cfg.setup_node(base_dir)?, &cfg.project);
    for skipped in &resolution.skipped {
        println!("Skipped {}: {}", skipped.path, skipped.description);
    }
    if resolution.units.is_empty() {
        bail!("setup in {} resolves to no simulation units", config_path.display());
    }

    let engine = SignalBacktester::new(cfg.position_size);
    let results = run_units(resolution.units, &data, &params, &engine, &StdoutProgress)?;

    let run_id = make_run_id(&text, started_at);
    let keys = store_results(store, &cfg.project, &run_id, &results)?;
    info!(project = %cfg.project, %run_id, artifacts = keys.len(), "run stored");
    println!("Stored {} result(s) as {}/{}", keys.len(), cfg.project, run_id);

    if performance {
        run_performance(store, &cfg.project, &run_id, cfg.initial_cash, cfg.commissions, false)?;
    }
    Ok(())
}

fn run_list(store: &FileStore, project: Option<&str>) -> Result<()> {
    let manager = SimulationsManager::new(store)?;
    match project {
        Some(project) => {
            for run_id in manager.runs_for(project)? {
                let run = manager.run_data(project, run_id)?;
                println!("{run_id}  {} artifact(s)", run.records().count());
            }
        }
        None => {
            let projects = manager.projects();
            if projects.is_empty() {
                println!("No runs in {}", store.root().display());
            }
            for project in projects {
                println!("{project}  {} run(s)", manager.runs_for(project)?.len());
            }
        }
    }
    Ok(())
}

fn run_performance(
    store: &FileStore,
    project: &str,
    run_id: &str,
    initial_cash: f64,
    commissions: f64,
    force: bool,
) -> Result<()> {
    let manager = SimulationsManager::new(store)?;
    let run = manager.run_data(project, run_id)?;
    let batch = run.calc_performance(initial_cash, commissions, force, &StdoutProgress);
    println!(
        "Performance: {} computed, {} skipped, {} failed",
        batch.computed,
        batch.skipped,
        batch.failed.len()
    );
    for (key, err) in &batch.failed {
        eprintln!("  failed {key}: {err}");
    }
    if !batch.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_report(store: &FileStore, project: &str, run_id: &str, csv: Option<&Path>) -> Result<()> {
    let manager = SimulationsManager::new(store)?;
    let report = manager.run_data(project, run_id)?.comparison_report()?;
    if report.is_empty() {
        warn!(%project, %run_id, "no performance summaries; run `performance` first");
        println!("No rows for {project}/{run_id}");
        return Ok(());
    }
    print!("{report}");
    if let Some(path) = csv {
        report
            .to_csv_path(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Report written to: {}", path.display());
    }
    Ok(())
}

fn run_delete(store: &FileStore, project: &str, run_id: &str) -> Result<()> {
    let mut manager = SimulationsManager::new(store)?;
    let removed = manager.delete_run(project, run_id)?;
    println!("Deleted {removed} artifact(s) of {project}/{run_id}");
    Ok(())
}

const DEMO_SETUP: &str = r#"project = "demo"
data = "data"
start = "2024-01-08"
stop = "60d"
spread = 0.02
commissions = 0.0002

[setup.trend]
signal = { type = "crossing_movings", fast = 12, slow = 48, slow_type = "ema" }
tracker = { type = "percent_trailing", trail_pct = 0.03 }

[setup.breakout]
signal = { type = "range_breakout", threshold = 0.0 }
tracker = { type = "fixed_stop", stop_pct = 0.02, take_pct = 0.04 }

[setup.reversion]
rsi = { type = "rsi_cross", period = 14, lower = 30, upper = 70 }
ibs = { type = "internal_bar_strength", timeframe = "1d", threshold = 0.2 }
equilibrium = { type = "equilibrium", period = 24, threshold = 0.5 }
momentum = { type = "outstretched_momentum", period = 24, smoothing = 6 }

[setup.baseline]
hold = { type = "time_exit", max_bars = 24 }
"#;

fn run_demo(out: &Path, bars: usize, seed: u64) -> Result<()> {
    let data_dir = out.join("data");
    fs::create_dir_all(&data_dir).with_context(|| format!("creating {}", data_dir.display()))?;

    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("demo start date")?;
    for (i, symbol) in ["ALPHA", "BETA", "GAMMA"].iter().enumerate() {
        let frame = random_walk(&WalkParams::hourly(start, bars, seed + i as u64))?;
        let path = data_dir.join(format!("{symbol}.csv"));
        write_csv(&frame, &path)?;
        println!("Wrote {} bars to {}", frame.len(), path.display());
    }

    let setup_path = out.join("demo.toml");
    fs::write(&setup_path, DEMO_SETUP).with_context(|| format!("writing {}", setup_path.display()))?;
    println!("Wrote {}", setup_path.display());
    println!("Next: siglab simulate {} --performance", setup_path.display());
    Ok(())
}
