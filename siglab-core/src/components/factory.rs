//! Factory system — converts a `ComponentSpec` (type name + parameters) into runtime trait objects.
//!
//! Generators come back wrapped in [`Windowed`] so a simulation interval can
//! narrow them. Parameters missing from a `ComponentSpec` fall back to the defaults
//! documented next to each generator.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::indicators::SmoothingKind;

use super::signal::{
    ConfigError, CrossingMovings, Equilibrium, InternalBarStrength, OutstretchedMomentum, Params,
    PivotsBreakoutDetector, RangeBreakoutDetector, RsiCross, SignalGenerator, Windowed,
};
use super::tracker::{FixedStop, PercentTrailing, TimeExit, Tracker};

// ─── Types ───────────────────────────────────────────────────────────

/// A component named by type with its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub component_type: String,
    #[serde(default)]
    pub params: Params,
}

impl ComponentSpec {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            params: Params::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// What a component type name builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Generator,
    Tracker,
}

pub const GENERATOR_TYPES: &[&str] = &[
    "range_breakout",
    "pivots_breakout",
    "crossing_movings",
    "rsi_cross",
    "outstretched_momentum",
    "internal_bar_strength",
    "equilibrium",
];

pub const TRACKER_TYPES: &[&str] = &["fixed_stop", "percent_trailing", "time_exit"];

/// Classify a type name; `None` for unknown types.
pub fn component_kind(component_type: &str) -> Option<ComponentKind> {
    let canonical = canonical_type(component_type);
    if GENERATOR_TYPES.contains(&canonical) {
        Some(ComponentKind::Generator)
    } else if TRACKER_TYPES.contains(&canonical) {
        Some(ComponentKind::Tracker)
    } else {
        None
    }
}

fn canonical_type(component_type: &str) -> &str {
    match component_type {
        "rsi" => "rsi_cross",
        "osi_momentum" | "osi" => "outstretched_momentum",
        "ibs" => "internal_bar_strength",
        "ma_cross" => "crossing_movings",
        other => other,
    }
}

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during component construction.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown signal generator type: {0}")]
    UnknownSignal(String),
    #[error("Unknown tracker type: {0}")]
    UnknownTracker(String),
    #[error("{component}: parameter '{name}' {message}")]
    Param {
        component: String,
        name: String,
        message: String,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn bad(spec: &ComponentSpec, name: &str, message: &str) -> FactoryError {
    FactoryError::Param {
        component: spec.component_type.clone(),
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Named f64 parameter, falling back to `default`.
fn param(spec: &ComponentSpec, name: &str, default: f64) -> Result<f64, FactoryError> {
    Ok(param_opt(spec, name)?.unwrap_or(default))
}

fn param_opt(spec: &ComponentSpec, name: &str) -> Result<Option<f64>, FactoryError> {
    match spec.params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| bad(spec, name, "must be a number")),
    }
}

/// Named non-negative integer parameter, falling back to `default`.
fn param_usize(spec: &ComponentSpec, name: &str, default: usize) -> Result<usize, FactoryError> {
    match spec.params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| bad(spec, name, "must be a non-negative integer")),
    }
}

/// Parameter without a default.
fn required_usize(spec: &ComponentSpec, name: &str) -> Result<usize, FactoryError> {
    if spec.params.contains_key(name) {
        param_usize(spec, name, 0)
    } else {
        Err(bad(spec, name, "is required"))
    }
}

fn required_f64(spec: &ComponentSpec, name: &str) -> Result<f64, FactoryError> {
    param_opt(spec, name)?.ok_or_else(|| bad(spec, name, "is required"))
}

fn param_str<'a>(spec: &'a ComponentSpec, name: &str, default: &'a str) -> Result<&'a str, FactoryError> {
    match spec.params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(bad(spec, name, "must be a string")),
    }
}

fn param_smoother(
    spec: &ComponentSpec,
    name: &str,
    default: SmoothingKind,
) -> Result<SmoothingKind, FactoryError> {
    match spec.params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => s.parse().map_err(|e: String| bad(spec, name, &e)),
        Some(_) => Err(bad(spec, name, "must be a string")),
    }
}

/// A single column name or a list of them.
fn param_columns(spec: &ComponentSpec, name: &str) -> Result<Vec<String>, FactoryError> {
    match spec.params.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| bad(spec, name, "must list column names"))
            })
            .collect(),
        Some(_) => Err(bad(spec, name, "must be a column name or a list of them")),
    }
}

// ─── Signal factory ──────────────────────────────────────────────────

/// Create a windowed signal generator from a `ComponentSpec`.
pub fn create_signal(spec: &ComponentSpec) -> Result<Box<dyn SignalGenerator>, FactoryError> {
    let inner: Box<dyn SignalGenerator> = match canonical_type(&spec.component_type) {
        "range_breakout" => {
            let threshold = param(spec, "threshold", 0.0)?;
            let offset_secs = param(spec, "pre_close_offset_secs", 1.0)?;
            let offset = Duration::milliseconds((offset_secs * 1000.0).round() as i64);
            Box::new(RangeBreakoutDetector::with_pre_close_offset(threshold, offset)?)
        }
        "pivots_breakout" => {
            let resistances = param_columns(spec, "resistances")?;
            let supports = param_columns(spec, "supports")?;
            Box::new(PivotsBreakoutDetector::new(resistances, supports)?)
        }
        "crossing_movings" => {
            let fast = required_usize(spec, "fast")?;
            let slow = required_usize(spec, "slow")?;
            let fast_kind = param_smoother(spec, "fast_type", SmoothingKind::Sma)?;
            let slow_kind = param_smoother(spec, "slow_type", SmoothingKind::Sma)?;
            Box::new(CrossingMovings::new(fast, slow, fast_kind, slow_kind)?)
        }
        "rsi_cross" => {
            let period = required_usize(spec, "period")?;
            let lower = param(spec, "lower", 25.0)?;
            let upper = param(spec, "upper", 75.0)?;
            let smoother = param_smoother(spec, "smoother", SmoothingKind::Sma)?;
            Box::new(RsiCross::new(period, lower, upper, smoother)?)
        }
        "outstretched_momentum" => {
            let period = required_usize(spec, "period")?;
            let smoothing = required_usize(spec, "smoothing")?;
            let threshold = param(spec, "threshold", 0.05)?;
            Box::new(OutstretchedMomentum::new(period, smoothing, threshold)?)
        }
        "internal_bar_strength" => {
            let timeframe = param_str(spec, "timeframe", "1d")?;
            let threshold = required_f64(spec, "threshold")?;
            let tz = param_str(spec, "tz", "UTC")?;
            Box::new(InternalBarStrength::new(timeframe, threshold, tz)?)
        }
        "equilibrium" => {
            let period = required_usize(spec, "period")?;
            let threshold = required_f64(spec, "threshold")?;
            let smoother = param_smoother(spec, "smoother", SmoothingKind::Sma)?;
            Box::new(Equilibrium::new(period, threshold, smoother)?)
        }
        other => return Err(FactoryError::UnknownSignal(other.to_string())),
    };
    Ok(Box::new(Windowed::new(inner)))
}

// ─── Tracker factory ─────────────────────────────────────────────────

/// Create a tracker from a `ComponentSpec`.
pub fn create_tracker(spec: &ComponentSpec) -> Result<Box<dyn Tracker>, FactoryError> {
    match spec.component_type.as_str() {
        "fixed_stop" => {
            let stop_pct = param_opt(spec, "stop_pct")?;
            let take_pct = param_opt(spec, "take_pct")?;
            Ok(Box::new(FixedStop::new(stop_pct, take_pct)?))
        }
        "percent_trailing" => {
            let trail_pct = param(spec, "trail_pct", 0.05)?;
            Ok(Box::new(PercentTrailing::new(trail_pct)?))
        }
        "time_exit" => {
            let max_bars = param_usize(spec, "max_bars", 20)?;
            Ok(Box::new(TimeExit::new(max_bars)?))
        }
        other => Err(FactoryError::UnknownTracker(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_generator_type_builds() {
        let specs = [
            ComponentSpec::new("range_breakout"),
            ComponentSpec::new("pivots_breakout").with("resistances", "R1"),
            ComponentSpec::new("crossing_movings").with("fast", 5).with("slow", 20),
            ComponentSpec::new("rsi_cross").with("period", 14),
            ComponentSpec::new("outstretched_momentum").with("period", 3).with("smoothing", 5),
            ComponentSpec::new("internal_bar_strength").with("threshold", 0.2),
            ComponentSpec::new("equilibrium").with("period", 5).with("threshold", 0.5),
        ];
        for spec in &specs {
            let g = create_signal(spec).unwrap();
            assert_eq!(g.name(), spec.component_type);
        }
        assert_eq!(specs.len(), GENERATOR_TYPES.len());
    }

    #[test]
    fn aliases_resolve() {
        let g = create_signal(&ComponentSpec::new("ibs").with("threshold", 0.1)).unwrap();
        assert_eq!(g.name(), "internal_bar_strength");
        assert!(g.uses_exact_timestamp());
        assert_eq!(component_kind("osi"), Some(ComponentKind::Generator));
    }

    #[test]
    fn signal_with_custom_params() {
        let spec = ComponentSpec::new("crossing_movings")
            .with("fast", 3)
            .with("slow", 8)
            .with("fast_type", "ema");
        let g = create_signal(&spec).unwrap();
        let params = g.params();
        assert_eq!(params["fast"], json!(3));
        assert_eq!(params["fast_type"], json!("ema"));
        assert_eq!(params["slow_type"], json!("sma"));
    }

    #[test]
    fn pivot_levels_accept_lists() {
        let spec = ComponentSpec::new("pivots_breakout")
            .with("resistances", json!(["R1", "R2"]))
            .with("supports", "S1");
        let g = create_signal(&spec).unwrap();
        assert_eq!(g.params()["resistances"], json!(["R1", "R2"]));
    }

    #[test]
    fn missing_required_param() {
        let err = create_signal(&ComponentSpec::new("crossing_movings").with("fast", 3)).unwrap_err();
        assert!(matches!(err, FactoryError::Param { ref name, .. } if name == "slow"));
    }

    #[test]
    fn wrong_param_type() {
        let err = create_signal(&ComponentSpec::new("rsi_cross").with("period", "fourteen")).unwrap_err();
        assert!(err.to_string().contains("non-negative integer"));
    }

    #[test]
    fn validation_errors_pass_through() {
        let spec = ComponentSpec::new("outstretched_momentum")
            .with("period", 3)
            .with("smoothing", 5)
            .with("threshold", 2.0);
        assert!(matches!(create_signal(&spec), Err(FactoryError::Config(_))));
    }

    #[test]
    fn trackers_build() {
        let t = create_tracker(&ComponentSpec::new("fixed_stop").with("stop_pct", 0.02)).unwrap();
        assert_eq!(t.name(), "fixed_stop");
        let t = create_tracker(&ComponentSpec::new("percent_trailing")).unwrap();
        assert_eq!(t.params()["trail_pct"], json!(0.05));
        assert!(create_tracker(&ComponentSpec::new("time_exit").with("max_bars", 5)).is_ok());
        assert_eq!(component_kind("time_exit"), Some(ComponentKind::Tracker));
    }

    #[test]
    fn unknown_types_are_errors() {
        assert!(matches!(
            create_signal(&ComponentSpec::new("neural_net")),
            Err(FactoryError::UnknownSignal(_))
        ));
        assert!(matches!(
            create_tracker(&ComponentSpec::new("martingale")),
            Err(FactoryError::UnknownTracker(_))
        ));
        assert_eq!(component_kind("neural_net"), None);
    }
}
