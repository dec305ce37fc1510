//! Percent trailing stop — trail at a fixed percentage behind the best price since entry.
//!
//! For longs: stop = highest_since_entry * (1 - trail_pct).
//! For shorts: stop = lowest_since_entry * (1 + trail_pct).

use serde_json::json;

use crate::components::signal::{ConfigError, Params};
use crate::domain::{Bar, OpenPosition, Side};

use super::{Tracker, TrackerAction};

#[derive(Debug, Clone)]
pub struct PercentTrailing {
    /// Trail distance as a fraction (e.g., 0.10 for 10%).
    pub trail_pct: f64,
}

impl PercentTrailing {
    pub fn new(trail_pct: f64) -> Result<Self, ConfigError> {
        if !(trail_pct > 0.0 && trail_pct < 1.0) {
            return Err(ConfigError::new("percent_trailing", "trail_pct must lie in (0, 1)"));
        }
        Ok(Self { trail_pct })
    }
}

impl Tracker for PercentTrailing {
    fn name(&self) -> &str {
        "percent_trailing"
    }

    fn params(&self) -> Params {
        Params::from([("trail_pct".to_string(), json!(self.trail_pct))])
    }

    fn on_bar(&self, position: &OpenPosition, _bar: &Bar) -> TrackerAction {
        let stop = match position.side {
            Side::Long => position.highest_since_entry * (1.0 - self.trail_pct),
            Side::Short => position.lowest_since_entry * (1.0 + self.trail_pct),
        };
        TrackerAction::stop(stop)
    }
}
