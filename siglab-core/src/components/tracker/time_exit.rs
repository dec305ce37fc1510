//! Time exit — close the position after a fixed number of bars regardless of price.

use serde_json::json;

use crate::components::signal::{ConfigError, Params};
use crate::domain::{Bar, OpenPosition};

use super::{Tracker, TrackerAction};

#[derive(Debug, Clone)]
pub struct TimeExit {
    pub max_bars: usize,
}

impl TimeExit {
    pub fn new(max_bars: usize) -> Result<Self, ConfigError> {
        if max_bars == 0 {
            return Err(ConfigError::new("time_exit", "max_bars must be > 0"));
        }
        Ok(Self { max_bars })
    }
}

impl Tracker for TimeExit {
    fn name(&self) -> &str {
        "time_exit"
    }

    fn params(&self) -> Params {
        Params::from([("max_bars".to_string(), json!(self.max_bars))])
    }

    fn on_bar(&self, position: &OpenPosition, _bar: &Bar) -> TrackerAction {
        if position.bars_held >= self.max_bars {
            TrackerAction::Exit
        } else {
            TrackerAction::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tracker::make_bar;
    use crate::domain::test_support::ts;
    use crate::domain::Side;

    #[test]
    fn exits_at_limit() {
        let t = TimeExit::new(3).unwrap();
        let mut pos = OpenPosition::new(Side::Long, 100.0, ts(0));
        pos.bars_held = 2;
        assert_eq!(t.on_bar(&pos, &make_bar(100.0)), TrackerAction::Hold);
        pos.bars_held = 3;
        assert_eq!(t.on_bar(&pos, &make_bar(100.0)), TrackerAction::Exit);
    }

    #[test]
    fn zero_bars_rejected() {
        assert!(TimeExit::new(0).is_err());
    }
}
