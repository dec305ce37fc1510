//! Comparison report — one row per stored simulation, ranked by Sharpe.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::store::RunArtifact;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub task: String,
    pub sharpe: f64,
    pub gain: f64,
    /// CAGR in percent.
    pub cagr_pct: f64,
    pub dd_usd: f64,
    pub dd_pct: f64,
    pub n_execs: usize,
    pub args: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonReport {
    /// Sharpe descending; NaN sorts last.
    pub rows: Vec<ReportRow>,
}

const FIXED_COLUMNS: [&str; 7] = ["task", "sharpe", "gain", "cagr_pct", "dd_usd", "dd_pct", "n_execs"];

impl ComparisonReport {
    /// Rows for every artifact carrying a performance summary; the rest are skipped.
    /// A later artifact with the same task replaces an earlier one.
    pub fn from_artifacts<'a>(artifacts: impl IntoIterator<Item = &'a RunArtifact>) -> Self {
        let mut by_task: BTreeMap<&str, ReportRow> = BTreeMap::new();
        for artifact in artifacts {
            let Some(p) = &artifact.performance else {
                continue;
            };
            by_task.insert(
                &artifact.task,
                ReportRow {
                    task: artifact.task.clone(),
                    sharpe: p.sharpe,
                    gain: p.gain,
                    cagr_pct: 100.0 * p.cagr,
                    dd_usd: p.mdd_usd,
                    dd_pct: p.drawdown_pct,
                    n_execs: p.n_execs,
                    args: artifact.task_args.clone(),
                },
            );
        }
        let mut rows: Vec<ReportRow> = by_task.into_values().collect();
        rows.sort_by(|a, b| match (a.sharpe.is_nan(), b.sharpe.is_nan()) {
            (false, false) => b.sharpe.total_cmp(&a.sharpe),
            (nan_a, nan_b) => nan_a.cmp(&nan_b),
        });
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of argument names across rows, sorted.
    pub fn arg_columns(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.args.keys().map(String::as_str))
            .collect();
        names.into_iter().collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let args = self.arg_columns();
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(FIXED_COLUMNS.iter().copied().chain(args.iter().copied()))?;
        for row in &self.rows {
            let mut record = vec![
                row.task.clone(),
                row.sharpe.to_string(),
                row.gain.to_string(),
                row.cagr_pct.to_string(),
                row.dd_usd.to_string(),
                row.dd_pct.to_string(),
                row.n_execs.to_string(),
            ];
            record.extend(args.iter().map(|name| row.args.get(*name).map(cell).unwrap_or_default()));
            w.write_record(&record)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn to_csv_path(&self, path: &Path) -> Result<(), ReportError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

/// Strings unquoted, everything else as JSON text.
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rows.iter().map(|r| r.task.len()).max().unwrap_or(4).max(4);
        writeln!(
            f,
            "{:<width$}  {:>8}  {:>12}  {:>8}  {:>12}  {:>8}  {:>6}",
            "task", "sharpe", "gain", "cagr%", "dd_usd", "dd%", "execs"
        )?;
        for r in &self.rows {
            writeln!(
                f,
                "{:<width$}  {:>8.3}  {:>12.2}  {:>8.2}  {:>12.2}  {:>8.2}  {:>6}",
                r.task, r.sharpe, r.gain, r.cagr_pct, r.dd_usd, r.dd_pct, r.n_execs
            )?;
        }
        Ok(())
    }
}
