//! Fixed stop / take-profit — levels placed once relative to the entry price.
//!
//! For longs: stop = entry * (1 - stop_pct), target = entry * (1 + take_pct).
//! Shorts mirror.

use serde_json::json;

use crate::components::signal::{ConfigError, Params};
use crate::domain::{Bar, OpenPosition};

use super::{Tracker, TrackerAction};

#[derive(Debug, Clone)]
pub struct FixedStop {
    /// Stop distance as a fraction (e.g., 0.05 for 5%).
    pub stop_pct: Option<f64>,
    /// Target distance as a fraction.
    pub take_pct: Option<f64>,
}

impl FixedStop {
    pub fn new(stop_pct: Option<f64>, take_pct: Option<f64>) -> Result<Self, ConfigError> {
        if stop_pct.is_none() && take_pct.is_none() {
            return Err(ConfigError::new("fixed_stop", "need stop_pct or take_pct"));
        }
        if stop_pct.is_some_and(|p| !(p > 0.0 && p < 1.0)) {
            return Err(ConfigError::new("fixed_stop", "stop_pct must lie in (0, 1)"));
        }
        if take_pct.is_some_and(|p| !(p > 0.0)) {
            return Err(ConfigError::new("fixed_stop", "take_pct must be positive"));
        }
        Ok(Self { stop_pct, take_pct })
    }
}

impl Tracker for FixedStop {
    fn name(&self) -> &str {
        "fixed_stop"
    }

    fn params(&self) -> Params {
        Params::from([
            ("stop_pct".to_string(), json!(self.stop_pct)),
            ("take_pct".to_string(), json!(self.take_pct)),
        ])
    }

    fn on_bar(&self, position: &OpenPosition, _bar: &Bar) -> TrackerAction {
        // Only place levels once.
        if position.stop.is_some() || position.target.is_some() {
            return TrackerAction::Hold;
        }
        let sign = position.side.as_f64();
        let entry = position.entry_price;
        let stop = self.stop_pct.map(|p| entry * (1.0 - sign * p));
        let target = self.take_pct.map(|p| entry * (1.0 + sign * p));
        TrackerAction::Update { stop, target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tracker::make_bar;
    use crate::domain::test_support::ts;
    use crate::domain::Side;

    #[test]
    fn long_levels_around_entry() {
        let t = FixedStop::new(Some(0.05), Some(0.10)).unwrap();
        let pos = OpenPosition::new(Side::Long, 100.0, ts(0));
        match t.on_bar(&pos, &make_bar(102.0)) {
            TrackerAction::Update { stop, target } => {
                assert!((stop.unwrap() - 95.0).abs() < 1e-9);
                assert!((target.unwrap() - 110.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_levels_mirror() {
        let t = FixedStop::new(Some(0.05), None).unwrap();
        let pos = OpenPosition::new(Side::Short, 100.0, ts(0));
        assert_eq!(
            t.on_bar(&pos, &make_bar(99.0)),
            TrackerAction::Update { stop: Some(105.0), target: None }
        );
    }

    #[test]
    fn holds_once_placed() {
        let t = FixedStop::new(Some(0.05), None).unwrap();
        let mut pos = OpenPosition::new(Side::Long, 100.0, ts(0));
        pos.stop = Some(95.0);
        assert_eq!(t.on_bar(&pos, &make_bar(90.0)), TrackerAction::Hold);
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(FixedStop::new(None, None).is_err());
        assert!(FixedStop::new(Some(1.5), None).is_err());
        assert!(FixedStop::new(None, Some(-0.1)).is_err());
    }
}
