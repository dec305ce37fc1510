//! CSV market data.

use std::path::Path;

use crate::domain::Frame;

use super::{parse_timestamp, DataError, TIMESTAMP_COLUMN};

/// Load a CSV file with a `timestamp` column; every other column must be numeric.
///
/// Empty cells become NaN.
pub fn load_csv(path: &Path) -> Result<Frame, DataError> {
    let mut reader = ::csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let ts_pos = headers
        .iter()
        .position(|h| h.trim() == TIMESTAMP_COLUMN)
        .ok_or_else(|| DataError::MissingTimestamp(path.to_path_buf()))?;
    let names: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_pos)
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let raw_ts = record.get(ts_pos).unwrap_or_default();
        let ts = parse_timestamp(raw_ts).ok_or_else(|| DataError::Timestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        index.push(ts);
        for ((pos, name), column) in names.iter().zip(columns.iter_mut()) {
            let cell = record.get(*pos).unwrap_or_default().trim();
            let value = if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                f64::NAN
            } else {
                cell.parse().map_err(|_| DataError::Value {
                    row,
                    column: name.clone(),
                    value: cell.to_string(),
                })?
            };
            column.push(value);
        }
    }

    let frame_err = |source| DataError::Frame {
        path: path.to_path_buf(),
        source,
    };
    let mut frame = Frame::new(index).map_err(frame_err)?;
    for ((_, name), values) in names.into_iter().zip(columns) {
        frame.insert_column(name, values).map_err(frame_err)?;
    }
    Ok(frame)
}

/// Write a frame as CSV with a leading `timestamp` column.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<(), DataError> {
    let mut writer = ::csv::Writer::from_path(path)?;
    let names: Vec<&str> = frame.column_names().collect();
    let mut header = vec![TIMESTAMP_COLUMN];
    header.extend(&names);
    writer.write_record(&header)?;

    let columns = names
        .iter()
        .map(|n| frame.column(n))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DataError::Frame {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    for (row, ts) in frame.index().iter().enumerate() {
        let mut record = vec![ts.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(columns.iter().map(|c| c[row].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
