//! Parquet market data via Polars.
//!
//! The `timestamp` column may be a Datetime (any unit), a Date, or an Int64 of
//! epoch milliseconds. Every other column is cast to Float64; nulls become NaN.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use std::fs;
use std::path::Path;

use crate::domain::Frame;

use super::{DataError, TIMESTAMP_COLUMN};

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> DataError + '_ {
    move |e| DataError::Parquet(format!("{context}: {e}"))
}

/// Load a Parquet file into a frame.
pub fn load_parquet(path: &Path) -> Result<Frame, DataError> {
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file).finish().map_err(parquet_err("read"))?;

    let ts_col = df
        .column(TIMESTAMP_COLUMN)
        .map_err(|_| DataError::MissingTimestamp(path.to_path_buf()))?;
    let index = timestamps(ts_col)?;

    let frame_err = |source| DataError::Frame {
        path: path.to_path_buf(),
        source,
    };
    let mut frame = Frame::new(index).map_err(frame_err)?;
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == TIMESTAMP_COLUMN {
            continue;
        }
        let cast = column
            .cast(&DataType::Float64)
            .map_err(parquet_err("float cast"))?;
        let values: Vec<f64> = cast
            .f64()
            .map_err(parquet_err("float column"))?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        frame.insert_column(name, values).map_err(frame_err)?;
    }
    Ok(frame)
}

fn timestamps(column: &Column) -> Result<Vec<NaiveDateTime>, DataError> {
    let to_millis: fn(i64) -> i64 = match column.dtype() {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => |v| v / 1_000_000,
        DataType::Datetime(TimeUnit::Microseconds, _) => |v| v / 1_000,
        DataType::Datetime(TimeUnit::Milliseconds, _) | DataType::Int64 => |v| v,
        DataType::Date => |v| v * 86_400_000,
        other => {
            return Err(DataError::Parquet(format!(
                "unsupported timestamp type {other}"
            )))
        }
    };
    let physical = column
        .to_physical_repr()
        .cast(&DataType::Int64)
        .map_err(parquet_err("timestamp cast"))?;
    physical
        .i64()
        .map_err(parquet_err("timestamp column"))?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.and_then(|v| DateTime::from_timestamp_millis(to_millis(v)))
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| DataError::Timestamp {
                    row,
                    value: format!("{v:?}"),
                })
        })
        .collect()
}

/// Write a frame as Parquet with a millisecond Datetime `timestamp` column.
pub fn write_parquet(frame: &Frame, path: &Path) -> Result<(), DataError> {
    let millis: Vec<i64> = frame
        .index()
        .iter()
        .map(|t| t.and_utc().timestamp_millis())
        .collect();
    let mut columns = vec![Column::new(TIMESTAMP_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map_err(parquet_err("timestamp cast"))?];
    for name in frame.column_names() {
        let values = frame.column(name).map_err(|e| DataError::Frame {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        columns.push(Column::new(name.into(), values.to_vec()));
    }
    let mut df = DataFrame::new(columns).map_err(parquet_err("dataframe creation"))?;
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(parquet_err("write"))?;
    Ok(())
}
