//! Property tests for signal invariants.
//!
//! Uses proptest to verify:
//! 1. Crossings — up and down crossings are disjoint and never at the first sample
//! 2. Event merging — keep-last covers the union and lets the later stream win
//! 3. Ratchet monotonicity — stops may only tighten, never loosen

use proptest::prelude::*;
use siglab_core::components::tracker::ratchet_stop;
use siglab_core::domain::{EventSeries, MergePolicy, Side};
use siglab_core::edge::{cross_down_positions, cross_up_positions, Threshold};

use chrono::{Duration, NaiveDate, NaiveDateTime};

fn at(i: u16) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(i64::from(i))
}

fn arb_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![9 => -5.0..5.0_f64, 1 => Just(f64::NAN)], 0..200)
}

proptest! {
    #[test]
    fn crossings_are_disjoint_and_skip_first(series in arb_series(), level in -3.0..3.0_f64) {
        let up = cross_up_positions(&series, Threshold::Scalar(level)).unwrap();
        let down = cross_down_positions(&series, Threshold::Scalar(level)).unwrap();
        prop_assert!(!up.contains(&0));
        prop_assert!(!down.contains(&0));
        for i in &up {
            prop_assert!(!down.contains(i));
            prop_assert!(series[*i] > level && series[*i - 1] <= level);
        }
    }

    #[test]
    fn crossings_against_series_are_disjoint(
        pairs in prop::collection::vec((-5.0..5.0_f64, -5.0..5.0_f64), 0..200)
    ) {
        let (a, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let up = cross_up_positions(&a, Threshold::Series(&b)).unwrap();
        let down = cross_down_positions(&a, Threshold::Series(&b)).unwrap();
        for i in &up {
            prop_assert!(!down.contains(i));
        }
    }

    #[test]
    fn keep_last_merge_covers_union(
        first in prop::collection::btree_set(0u16..500, 0..50),
        second in prop::collection::btree_set(0u16..500, 0..50),
    ) {
        let a = EventSeries::from_timestamps(first.iter().map(|i| at(*i)), Side::Long);
        let b = EventSeries::from_timestamps(second.iter().map(|i| at(*i)), Side::Short);
        let merged = EventSeries::merge([a, b], MergePolicy::KeepLast);
        prop_assert_eq!(merged.len(), first.union(&second).count());
        for i in &second {
            prop_assert_eq!(merged.get(at(*i)), Some(Side::Short));
        }
    }

    #[test]
    fn long_stop_never_loosens(proposals in prop::collection::vec(50.0..150.0_f64, 1..50)) {
        let mut stop: Option<f64> = None;
        for p in proposals {
            let next = ratchet_stop(Side::Long, stop, p);
            if let Some(prev) = stop {
                prop_assert!(next >= prev);
            }
            stop = Some(next);
        }
    }
}
