//! Inverter output: raw readings to one mean value per hour.

use chrono::{NaiveDateTime, Timelike};
use polars::prelude::*;

use crate::domain::{datetime_series, PanelOutputSample, TIMESTAMP_COL};
use crate::error::PipelineResult;

/// Start of the hour holding `timestamp`.
pub fn floor_to_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// Hourly mean of the finite readings, one row per hour under column
/// `target`, sorted by hour. Hours without readings produce no row.
pub fn resample_hourly(samples: &[PanelOutputSample], target: &str) -> PipelineResult<DataFrame> {
    let (hours, values): (Vec<NaiveDateTime>, Vec<f64>) = samples
        .iter()
        .filter(|s| s.solar_power.is_finite())
        .map(|s| (floor_to_hour(s.timestamp), s.solar_power))
        .unzip();

    let readings = DataFrame::new(vec![
        datetime_series(TIMESTAMP_COL, &hours)?,
        Series::new(target, values),
    ])?;

    let hourly = readings
        .lazy()
        .group_by_stable([col(TIMESTAMP_COL)])
        .agg([col(target).mean()])
        .collect()?;
    Ok(hourly.sort([TIMESTAMP_COL], false, false)?)
}
