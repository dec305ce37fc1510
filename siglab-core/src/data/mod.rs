//! Market data loading: CSV and Parquet files into [`Frame`]s, plus synthetic data.
//!
//! Files carry a `timestamp` column and any number of numeric columns. A
//! directory of `{SYMBOL}.csv` / `{SYMBOL}.parquet` files loads as [`MarketData`].

pub mod csv;
pub mod parquet;
pub mod synthetic;

pub use self::csv::{load_csv, write_csv};
pub use parquet::{load_parquet, write_parquet};
pub use synthetic::{random_walk, WalkParams};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Frame, FrameError, MarketData};

pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("no 'timestamp' column in {}", .0.display())]
    MissingTimestamp(PathBuf),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    Value {
        row: usize,
        column: String,
        value: String,
    },

    #[error("{}: {source}", .path.display())]
    Frame {
        path: PathBuf,
        #[source]
        source: FrameError,
    },

    #[error("unsupported data file: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Parse RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S` or a bare date.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Load one file, dispatching on its extension.
pub fn load_file(path: &Path) -> Result<Frame, DataError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv(path),
        Some("parquet") => load_parquet(path),
        _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load every `{SYMBOL}.csv` / `{SYMBOL}.parquet` file in `dir`.
///
/// Files with other extensions are ignored.
pub fn load_dir(dir: &Path) -> Result<MarketData, DataError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut data = MarketData::new();
    for path in paths {
        let Some(symbol) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match load_file(&path) {
            Ok(frame) => {
                debug!(%symbol, rows = frame.len(), path = %path.display(), "loaded market data");
                data.insert(symbol, frame);
            }
            Err(DataError::UnsupportedFormat(_)) => {}
            Err(e) => return Err(e),
        }
    }
    if data.is_empty() {
        warn!(dir = %dir.display(), "no market data files found");
    }
    Ok(data)
}
