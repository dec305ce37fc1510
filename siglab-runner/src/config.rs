//! TOML simulation files.
//!
//! A file carries run-wide settings plus a `[setup]` table that is turned into
//! a [`SetupNode`] tree:
//!
//! ```toml
//! project = "majors"
//! data = "data"
//! start = "2024-01-01"
//! stop = "90d"
//!
//! [setup.cross]
//! signal = { type = "crossing_movings", fast = 5, slow = 20 }
//! tracker = { type = "time_exit", max_bars = 10 }
//!
//! [setup.oscillators]
//! rsi = { type = "rsi_cross", period = 14 }
//! ibs = { type = "internal_bar_strength", timeframe = "1d", threshold = 0.2 }
//! ```
//!
//! Table order is significant: it decides the order units run in.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use siglab_core::components::{
    component_kind, create_signal, create_tracker, ComponentKind, ComponentSpec, FactoryError,
};
use siglab_core::data::{self, parse_timestamp, DataError};
use siglab_core::domain::{MarketData, SchemaError, SignalFrame, Timeframe};
use thiserror::Error;

use crate::setup::SetupNode;
use crate::simulation::SimulationParams;

#[derive(Debug, Error)]
pub enum SetupConfigError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid time '{0}': expected a timestamp or a duration such as 90d")]
    Time(String),

    #[error("relative stop '{0}' needs a start")]
    RelativeStop(String),

    #[error("setup.{path}: {source}")]
    Component {
        path: String,
        #[source]
        source: FactoryError,
    },

    #[error("setup.{path}: {message}")]
    Setup { path: String, message: String },

    #[error("{}: {source}", .path.display())]
    Data {
        path: PathBuf,
        #[source]
        source: DataError,
    },

    #[error("{}: {source}", .path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
}

fn default_price_column() -> String {
    "close".to_string()
}

fn default_position_size() -> f64 {
    1.0
}

fn default_initial_cash() -> f64 {
    10_000.0
}

/// One simulation file.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub project: String,
    #[serde(default)]
    pub broker: String,
    #[serde(default)]
    pub spread: f64,
    /// Timestamp.
    pub start: Option<String>,
    /// Timestamp, or a duration after `start` such as `"90d"`.
    pub stop: Option<String>,
    #[serde(default = "default_price_column")]
    pub price_column: String,
    #[serde(default = "default_position_size")]
    pub position_size: f64,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    /// Fraction of traded notional.
    #[serde(default)]
    pub commissions: f64,
    /// A `{SYMBOL}.csv` / `.parquet` file or a directory of them, relative to the file.
    pub data: PathBuf,
    pub setup: toml::Table,
}

impl SimulationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SetupConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse `path`; returns the config and its raw text.
    pub fn load(path: &Path) -> Result<(Self, String), SetupConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| SetupConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((Self::from_toml_str(&text)?, text))
    }

    pub fn params(&self) -> Result<SimulationParams, SetupConfigError> {
        let start = self.start.as_deref().map(parse_time).transpose()?;
        let stop = match self.stop.as_deref() {
            None => None,
            Some(text) => Some(match parse_timestamp(text) {
                Some(ts) => ts,
                None => {
                    let offset = Timeframe::parse(text)
                        .map_err(|_| SetupConfigError::Time(text.to_string()))?;
                    let start = start.ok_or_else(|| SetupConfigError::RelativeStop(text.to_string()))?;
                    start
                        .checked_add_signed(offset.duration())
                        .ok_or_else(|| SetupConfigError::Time(text.to_string()))?
                }
            }),
        };
        Ok(SimulationParams {
            broker: self.broker.clone(),
            spread: self.spread,
            start,
            stop,
            price_column: self.price_column.clone(),
        })
    }

    /// The setup tree. Relative paths inside it resolve against `base_dir`.
    pub fn setup_node(&self, base_dir: &Path) -> Result<SetupNode, SetupConfigError> {
        build_table(&self.setup, "", base_dir)
    }

    pub fn market_data(&self, base_dir: &Path) -> Result<MarketData, SetupConfigError> {
        let path = base_dir.join(&self.data);
        let data_err = |source| SetupConfigError::Data {
            path: path.clone(),
            source,
        };
        if path.is_dir() {
            return data::load_dir(&path).map_err(data_err);
        }
        let frame = data::load_file(&path).map_err(data_err)?;
        let symbol = symbol_of(&path);
        Ok(MarketData::from([(symbol, frame)]))
    }
}

fn parse_time(text: &str) -> Result<NaiveDateTime, SetupConfigError> {
    parse_timestamp(text).ok_or_else(|| SetupConfigError::Time(text.to_string()))
}

fn symbol_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn build_node(value: &toml::Value, path: &str, base_dir: &Path) -> Result<SetupNode, SetupConfigError> {
    match value {
        toml::Value::Table(table) => build_table(table, path, base_dir),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| build_node(item, &child_path(path, &i.to_string()), base_dir))
            .collect::<Result<Vec<_>, _>>()
            .map(SetupNode::Sequence),
        other => Ok(SetupNode::Unknown(format!("{} value {other}", other.type_str()))),
    }
}

fn build_table(table: &toml::Table, path: &str, base_dir: &Path) -> Result<SetupNode, SetupConfigError> {
    if let Some(component_type) = table.get("type") {
        let Some(component_type) = component_type.as_str() else {
            return Err(SetupConfigError::Setup {
                path: path.to_string(),
                message: "'type' must be a string".to_string(),
            });
        };
        return build_component(component_type, table, path, base_dir);
    }
    if table.len() == 2 {
        if let (Some(signal), Some(tracker)) = (table.get("signal"), table.get("tracker")) {
            return Ok(SetupNode::paired(
                build_node(signal, &child_path(path, "signal"), base_dir)?,
                build_node(tracker, &child_path(path, "tracker"), base_dir)?,
            ));
        }
    }
    let mut entries = Vec::with_capacity(table.len());
    for (key, child) in table {
        entries.push((key.clone(), build_node(child, &child_path(path, key), base_dir)?));
    }
    Ok(SetupNode::Mapping(entries))
}

fn build_component(
    component_type: &str,
    table: &toml::Table,
    path: &str,
    base_dir: &Path,
) -> Result<SetupNode, SetupConfigError> {
    if component_type == "series" {
        return load_series(table, path, base_dir).map(SetupNode::Series);
    }
    let mut spec = ComponentSpec::new(component_type);
    for (key, value) in table.iter().filter(|(k, _)| k.as_str() != "type") {
        spec.params.insert(key.clone(), to_json(value));
    }
    let component_err = |source| SetupConfigError::Component {
        path: path.to_string(),
        source,
    };
    match component_kind(component_type) {
        Some(ComponentKind::Generator) => Ok(SetupNode::Generator(create_signal(&spec).map_err(component_err)?)),
        Some(ComponentKind::Tracker) => Ok(SetupNode::Tracker(create_tracker(&spec).map_err(component_err)?)),
        None => Ok(SetupNode::Unknown(format!("unknown component type '{component_type}'"))),
    }
}

/// `{ type = "series", path = "signals.csv" }`: a CSV with a timestamp column
/// and one signal column per symbol.
fn load_series(table: &toml::Table, path: &str, base_dir: &Path) -> Result<SignalFrame, SetupConfigError> {
    let Some(file) = table.get("path").and_then(toml::Value::as_str) else {
        return Err(SetupConfigError::Setup {
            path: path.to_string(),
            message: "series needs a 'path'".to_string(),
        });
    };
    let file = base_dir.join(file);
    let frame = data::load_csv(&file).map_err(|source| SetupConfigError::Data {
        path: file.clone(),
        source,
    })?;
    let mut signals = SignalFrame::new();
    for column in frame.column_names() {
        let series = frame.series(column).map_err(|source| SetupConfigError::Schema {
            path: file.clone(),
            source,
        })?;
        signals.insert(column.to_string(), series);
    }
    Ok(signals)
}

fn to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s.as_str()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::from(*b),
        toml::Value::Datetime(dt) => Value::from(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}
