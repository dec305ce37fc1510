//! Synthetic market data for demos and benchmarks.
//!
//! A seeded random walk of OHLC bars. Clearly fake; never mix with real data.

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Frame, FrameError};

#[derive(Debug, Clone, Copy)]
pub struct WalkParams {
    pub start: NaiveDateTime,
    pub bar: Duration,
    pub bars: usize,
    pub start_price: f64,
    /// Largest per-bar move as a fraction of price.
    pub max_move: f64,
    /// Lookback of the `RangeTop` / `RangeBot` channel columns.
    pub range_window: usize,
    pub seed: u64,
}

impl WalkParams {
    pub fn hourly(start: NaiveDateTime, bars: usize, seed: u64) -> Self {
        Self {
            start,
            bar: Duration::hours(1),
            bars,
            start_price: 100.0,
            max_move: 0.01,
            range_window: 24,
            seed,
        }
    }
}

/// Random-walk frame with `open`, `high`, `low`, `close`, `volume` and a
/// rolling `RangeTop` / `RangeBot` channel over the previous `range_window` bars.
pub fn random_walk(params: &WalkParams) -> Result<Frame, FrameError> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let n = params.bars;
    let index: Vec<NaiveDateTime> = (0..n)
        .map(|i| params.start + params.bar * i as i32)
        .collect();

    let mut open = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    let mut low = Vec::with_capacity(n);
    let mut close = Vec::with_capacity(n);
    let mut volume = Vec::with_capacity(n);
    let mut price = params.start_price;
    for _ in 0..n {
        let o = price;
        let c = o * (1.0 + rng.gen_range(-params.max_move..params.max_move));
        open.push(o);
        close.push(c);
        high.push(o.max(c) * (1.0 + rng.gen_range(0.0..params.max_move / 2.0)));
        low.push(o.min(c) * (1.0 - rng.gen_range(0.0..params.max_move / 2.0)));
        volume.push(rng.gen_range(1_000..10_000) as f64);
        price = c;
    }

    let w = params.range_window.max(1);
    let channel = |values: &[f64], pick: fn(f64, f64) -> f64| -> Vec<f64> {
        (0..n)
            .map(|i| {
                if i < w {
                    f64::NAN
                } else {
                    values[i - w..i].iter().copied().fold(values[i - w], pick)
                }
            })
            .collect()
    };
    let range_top = channel(&high, f64::max);
    let range_bot = channel(&low, f64::min);

    Frame::new(index)?
        .with_column("open", open)?
        .with_column("high", high)?
        .with_column("low", low)?
        .with_column("close", close)?
        .with_column("volume", volume)?
        .with_column("RangeTop", range_top)?
        .with_column("RangeBot", range_bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::ts;

    #[test]
    fn same_seed_same_walk() {
        let p = WalkParams::hourly(ts(0), 50, 7);
        assert_eq!(random_walk(&p).unwrap().column("close").unwrap(), random_walk(&p).unwrap().column("close").unwrap());
        let other = WalkParams { seed: 8, ..p };
        assert_ne!(random_walk(&p).unwrap().column("close").unwrap(), random_walk(&other).unwrap().column("close").unwrap());
    }

    #[test]
    fn bars_are_consistent() {
        let f = random_walk(&WalkParams::hourly(ts(0), 100, 1)).unwrap();
        let (o, h, l, c) = (
            f.column("open").unwrap(),
            f.column("high").unwrap(),
            f.column("low").unwrap(),
            f.column("close").unwrap(),
        );
        for i in 0..f.len() {
            assert!(h[i] >= o[i].max(c[i]));
            assert!(l[i] <= o[i].min(c[i]));
        }
        let top = f.column("RangeTop").unwrap();
        assert!(top[23].is_nan());
        assert_eq!(top[24], h[..24].iter().copied().fold(f64::MIN, f64::max));
        assert_eq!(f.bar_duration(), Some(Duration::hours(1)));
    }
}
