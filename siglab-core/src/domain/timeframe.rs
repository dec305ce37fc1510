//! Bar timeframes, fixed-offset timezones and OHLC resampling.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;

use super::frame::{Frame, SchemaError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("invalid timeframe '{0}' (expected e.g. 30s, 15min, 4h, 1d, 1w)")]
    Timeframe(String),

    #[error("unsupported timezone '{0}' (use UTC or a fixed offset such as +02:00)")]
    Timezone(String),
}

/// Length of one resampled bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeframe(Duration);

impl Timeframe {
    pub fn new(duration: Duration) -> Result<Self, TimeframeError> {
        if duration <= Duration::zero() {
            return Err(TimeframeError::Timeframe(format!("{duration}")));
        }
        Ok(Self(duration))
    }

    /// Parse `<count><unit>`; units: s, min/m/T, h/H, d/D, w/W. A bare unit means a count of 1.
    pub fn parse(text: &str) -> Result<Self, TimeframeError> {
        let text = text.trim();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeframeError::Timeframe(text.to_string()))?;
        let (count, unit) = text.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| TimeframeError::Timeframe(text.to_string()))?
        };
        let duration = match unit {
            "s" | "S" | "sec" => Duration::try_seconds(count),
            "m" | "min" | "Min" | "T" => Duration::try_minutes(count),
            "h" | "H" | "hour" => Duration::try_hours(count),
            "d" | "D" | "day" => Duration::try_days(count),
            "w" | "W" | "week" => Duration::try_weeks(count),
            _ => None,
        }
        .ok_or_else(|| TimeframeError::Timeframe(text.to_string()))?;
        Self::new(duration).map_err(|_| TimeframeError::Timeframe(text.to_string()))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// Parse `UTC`, `Z`, or a fixed offset (`+02:00`, `-0500`).
pub fn parse_offset(tz: &str) -> Result<FixedOffset, TimeframeError> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz == "Z" || tz.eq_ignore_ascii_case("gmt") {
        return FixedOffset::east_opt(0).ok_or_else(|| TimeframeError::Timezone(tz.to_string()));
    }
    let (sign, rest) = match tz.as_bytes().first() {
        Some(b'+') => (1, &tz[1..]),
        Some(b'-') => (-1, &tz[1..]),
        _ => return Err(TimeframeError::Timezone(tz.to_string())),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(TimeframeError::Timezone(tz.to_string()));
    }
    let hours: i32 = digits[..2].parse().map_err(|_| TimeframeError::Timezone(tz.to_string()))?;
    let minutes: i32 = digits[2..].parse().map_err(|_| TimeframeError::Timezone(tz.to_string()))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| TimeframeError::Timezone(tz.to_string()))
}

/// Start (UTC-naive) of the bucket containing `ts`, with buckets aligned in local time.
fn bucket_start(ts: NaiveDateTime, timeframe: Timeframe, offset: FixedOffset) -> NaiveDateTime {
    let offset_ms = i64::from(offset.local_minus_utc()) * 1000;
    let step = timeframe.duration().num_milliseconds();
    let local_ms = ts.and_utc().timestamp_millis() + offset_ms;
    let start_ms = local_ms.div_euclid(step) * step - offset_ms;
    DateTime::from_timestamp_millis(start_ms)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}

/// Aggregate OHLC bars into `timeframe` buckets labelled by their start.
///
/// Buckets with no valid rows are dropped. `volume`, when present, is summed.
pub fn resample_ohlc(
    frame: &Frame,
    timeframe: Timeframe,
    offset: FixedOffset,
) -> Result<Frame, SchemaError> {
    frame.require(&["open", "high", "low", "close"])?;
    let open = frame.column("open")?;
    let high = frame.column("high")?;
    let low = frame.column("low")?;
    let close = frame.column("close")?;
    let volume = frame.column("volume").ok();

    #[derive(Clone, Copy)]
    struct Agg {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    }

    let mut buckets: BTreeMap<NaiveDateTime, Agg> = BTreeMap::new();
    for (i, ts) in frame.index().iter().enumerate() {
        if open[i].is_nan() || high[i].is_nan() || low[i].is_nan() || close[i].is_nan() {
            continue;
        }
        let vol = volume.map_or(0.0, |v| if v[i].is_nan() { 0.0 } else { v[i] });
        buckets
            .entry(bucket_start(*ts, timeframe, offset))
            .and_modify(|a| {
                a.high = a.high.max(high[i]);
                a.low = a.low.min(low[i]);
                a.close = close[i];
                a.volume += vol;
            })
            .or_insert(Agg {
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: vol,
            });
    }

    let index: Vec<NaiveDateTime> = buckets.keys().copied().collect();
    let aggs: Vec<Agg> = buckets.into_values().collect();
    let mut out = Frame::new(index).map_err(|_| SchemaError { missing: Vec::new() })?;
    let columns: [(&str, fn(&Agg) -> f64); 4] = [
        ("open", |a| a.open),
        ("high", |a| a.high),
        ("low", |a| a.low),
        ("close", |a| a.close),
    ];
    for (name, get) in columns {
        out.insert_column(name, aggs.iter().map(get).collect())
            .map_err(|_| SchemaError { missing: vec![name.to_string()] })?;
    }
    if volume.is_some() {
        out.insert_column("volume", aggs.iter().map(|a| a.volume).collect())
            .map_err(|_| SchemaError { missing: vec!["volume".to_string()] })?;
    }
    Ok(out)
}
