//! Polars helpers for the hourly tables
//!
//! Every preprocessing step passes a `DataFrame` keyed by a `timestamp`
//! column of naive local datetimes. They are stored as millisecond
//! `Datetime` values without a timezone, so the epoch arithmetic below is
//! wall-clock arithmetic, not UTC conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::*;

use crate::error::{PipelineError, PipelineResult};

/// Wall-clock format used for every timestamp leaving the service.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Index column shared by every hourly table.
pub const TIMESTAMP_COL: &str = "timestamp";

pub fn datetime_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

pub fn datetime_series(name: &str, stamps: &[NaiveDateTime]) -> PipelineResult<Series> {
    let millis: Vec<i64> = stamps
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();
    Ok(Series::new(name, millis).cast(&datetime_dtype())?)
}

pub fn date_series(name: &str, dates: &[NaiveDate]) -> PipelineResult<Series> {
    let epoch = NaiveDate::default();
    let days: Vec<i32> = dates
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// The `timestamp` column, in row order.
pub fn timestamps(frame: &DataFrame) -> PipelineResult<Vec<NaiveDateTime>> {
    let millis = frame
        .column(TIMESTAMP_COL)?
        .cast(&datetime_dtype())?
        .cast(&DataType::Int64)?;

    millis
        .i64()?
        .into_iter()
        .map(|ms| {
            ms.and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| PipelineError::DataProcessing("null or out of range timestamp".into()))
        })
        .collect()
}

/// Values of a numeric column. A null is an error: callers only read
/// columns after nulls were dropped.
pub fn column_values(frame: &DataFrame, name: &str) -> PipelineResult<Vec<f64>> {
    let series = frame.column(name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::DataProcessing(format!("null value in column '{name}'")))
        })
        .collect()
}

/// Dense `height x names.len()` matrix of the named columns, in row order.
pub fn feature_matrix(frame: &DataFrame, names: &[String]) -> PipelineResult<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((frame.height(), names.len()));
    for (c, name) in names.iter().enumerate() {
        if !frame.get_column_names().contains(&name.as_str()) {
            return Err(PipelineError::DataProcessing(format!("missing column '{name}'")));
        }
        for (r, value) in column_values(frame, name)?.into_iter().enumerate() {
            matrix[[r, c]] = value;
        }
    }
    Ok(matrix)
}
