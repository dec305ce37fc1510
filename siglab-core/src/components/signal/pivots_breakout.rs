//! Pivot breakout detector — closes through named support / resistance levels.
//!
//! A resistance break needs the whole previous bar body below the level and
//! the current close above it; wicks alone never trigger. Supports mirror this.
//! Level columns absent from the frame are skipped.

use serde_json::json;

use crate::domain::{EventSeries, Frame, MarketContext, MergePolicy, Side};

use super::{ConfigError, Params, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct PivotsBreakoutDetector {
    pub resistances: Vec<String>,
    pub supports: Vec<String>,
}

impl PivotsBreakoutDetector {
    pub fn new<R, S>(resistances: R, supports: S) -> Result<Self, ConfigError>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let resistances: Vec<String> = resistances.into_iter().map(Into::into).collect();
        let supports: Vec<String> = supports.into_iter().map(Into::into).collect();
        if resistances.is_empty() && supports.is_empty() {
            return Err(ConfigError::new(
                "pivots_breakout",
                "at least one resistance or support level is required",
            ));
        }
        Ok(Self {
            resistances,
            supports,
        })
    }

    fn breaks(data: &Frame, level: &str, side: Side) -> Result<EventSeries, SignalError> {
        let level = data.column(level)?;
        let open = data.column("open")?;
        let close = data.column("close")?;
        let index = data.index();
        let crossed = |t: usize| match side {
            Side::Long => open[t - 1] < level[t] && close[t - 1] < level[t] && close[t] > level[t],
            Side::Short => open[t - 1] > level[t] && close[t - 1] > level[t] && close[t] < level[t],
        };
        Ok(EventSeries::from_timestamps(
            (1..index.len()).filter(|&t| crossed(t)).map(|t| index[t]),
            side,
        ))
    }
}

impl SignalGenerator for PivotsBreakoutDetector {
    fn name(&self) -> &str {
        "pivots_breakout"
    }

    fn params(&self) -> Params {
        Params::from([
            ("resistances".to_string(), json!(self.resistances)),
            ("supports".to_string(), json!(self.supports)),
        ])
    }

    fn predict(&self, data: &Frame, _ctx: &MarketContext) -> Result<EventSeries, SignalError> {
        data.require(&["open", "close"])?;

        let mut streams = Vec::new();
        for level in self.resistances.iter().filter(|l| data.has_column(l)) {
            streams.push(Self::breaks(data, level, Side::Long)?);
        }
        for level in self.supports.iter().filter(|l| data.has_column(l)) {
            streams.push(Self::breaks(data, level, Side::Short)?);
        }
        Ok(EventSeries::merge(streams, MergePolicy::KeepLast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{frame, ts};

    fn ctx() -> MarketContext {
        MarketContext::new("TEST", "close")
    }

    #[test]
    fn close_through_resistance_fires_long() {
        let f = frame(&[
            ("open", &[9.0, 9.5, 9.8]),
            ("close", &[9.5, 9.8, 10.5]),
            ("R1", &[10.0, 10.0, 10.0]),
        ]);
        let d = PivotsBreakoutDetector::new(["R1"], Vec::<String>::new()).unwrap();
        let events = d.predict(&f, &ctx()).unwrap();
        assert_eq!(events.timestamps(), vec![ts(2)]);
        assert_eq!(events.get(ts(2)), Some(Side::Long));
    }

    #[test]
    fn wick_without_close_is_ignored() {
        // Open above the level on the prior bar disqualifies the break.
        let f = frame(&[
            ("open", &[9.0, 10.2, 9.8]),
            ("close", &[9.5, 9.8, 10.5]),
            ("R1", &[10.0, 10.0, 10.0]),
        ]);
        let d = PivotsBreakoutDetector::new(["R1"], Vec::<String>::new()).unwrap();
        assert!(d.predict(&f, &ctx()).unwrap().is_empty());
    }

    #[test]
    fn absent_levels_are_skipped() {
        let f = frame(&[
            ("open", &[9.0, 9.5, 9.8, 10.4]),
            ("close", &[9.5, 9.8, 10.5, 10.6]),
            ("R1", &[10.0, 10.0, 10.0, 10.0]),
            ("R2", &[10.2, 10.2, 10.2, 10.2]),
            ("S1", &[11.0, 11.0, 11.0, 10.5]),
        ]);
        let d = PivotsBreakoutDetector::new(["R1", "R2", "R9"], ["S1", "S9"]).unwrap();
        let events = d.predict(&f, &ctx()).unwrap();
        // R1 and R2 both break on bar 2; they collapse into one event.
        assert_eq!(events.timestamps_of(Side::Long), vec![ts(2)]);
        assert!(events.timestamps_of(Side::Short).is_empty());
    }

    #[test]
    fn opposite_levels_never_fire_on_one_bar() {
        // A long break needs the prior body below the resistance and a short
        // break needs it above the support, so both at once would require
        // support < resistance < close < support. Only one side survives.
        let f = frame(&[
            ("open", &[10.0, 10.1]),
            ("close", &[10.2, 11.0]),
            ("R1", &[10.5, 10.5]),
            ("S1", &[10.8, 10.8]),
        ]);
        let d = PivotsBreakoutDetector::new(["R1"], ["S1"]).unwrap();
        let events = d.predict(&f, &ctx()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events.get(ts(1)), Some(Side::Long));
    }

    #[test]
    fn later_level_wins_a_shared_timestamp() {
        // Two resistances breaking together collapse to the last declared one;
        // both carry Long, so the merge keeps a single event.
        let f = frame(&[
            ("open", &[9.0, 9.5]),
            ("close", &[9.5, 10.6]),
            ("R1", &[10.0, 10.0]),
            ("R2", &[10.3, 10.3]),
        ]);
        let d = PivotsBreakoutDetector::new(["R1", "R2"], Vec::<String>::new()).unwrap();
        let events = d.predict(&f, &ctx()).unwrap();
        assert_eq!(events.timestamps(), vec![ts(1)]);
        assert_eq!(events.get(ts(1)), Some(Side::Long));
    }

    #[test]
    fn requires_open_and_close() {
        let f = frame(&[("close", &[1.0, 2.0])]);
        let d = PivotsBreakoutDetector::new(["R1"], ["S1"]).unwrap();
        assert!(matches!(d.predict(&f, &ctx()), Err(SignalError::Schema(_))));
    }

    #[test]
    fn no_levels_is_a_config_error() {
        assert!(PivotsBreakoutDetector::new(Vec::<String>::new(), Vec::<String>::new()).is_err());
    }
}
