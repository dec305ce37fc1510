//! Shared fixtures for unit tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// 2024-01-02 00:00 plus `i` hours.
pub(crate) fn ts(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t + Duration::hours(i))
        .unwrap()
}

/// Frame with hourly index `ts(0..n)` and the given columns.
pub(crate) fn frame(columns: &[(&str, &[f64])]) -> super::Frame {
    let n = columns.first().map_or(0, |(_, v)| v.len());
    let mut f = super::Frame::new((0..n as i64).map(ts).collect()).unwrap();
    for (name, values) in columns {
        f.insert_column(*name, values.to_vec()).unwrap();
    }
    f
}
