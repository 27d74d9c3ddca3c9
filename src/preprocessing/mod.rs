//! Dataset preprocessing
//!
//! Every step takes a table and returns a new one:
//! weather cleaning, sun times cleaning, daylight filter, feature
//! engineering and, for training, inverter resampling plus an inner join
//! on the hourly index.

pub mod daylight;
pub mod features;
pub mod inverter;

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::domain::{datetime_series, TIMESTAMP_COL};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::{RawWeatherTable, SunTimesTable, WEATHER_VARIABLES};

pub use daylight::{clean_suntimes, filter_daylight, DaylightWindow, DAYLIGHT_PADDING_HOURS};
pub use features::{default_feature_columns, engineer_features, ENGINEERED_FEATURES};
pub use inverter::{floor_to_hour, resample_hourly};

/// Timestamp layouts the weather provider emits.
const WEATHER_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

fn parse_weather_time(raw: &str) -> PipelineResult<NaiveDateTime> {
    WEATHER_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| PipelineError::DataProcessing(format!("unparseable weather timestamp '{raw}'")))
}

/// Parse the provider timestamps into a sorted `timestamp` column next to
/// one nullable column per weather variable. A repeated timestamp keeps
/// its first row.
pub fn clean_weather(raw: &RawWeatherTable) -> PipelineResult<DataFrame> {
    let stamps = raw
        .time
        .iter()
        .map(|stamp| parse_weather_time(stamp))
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut columns = vec![datetime_series(TIMESTAMP_COL, &stamps)?];
    for name in WEATHER_VARIABLES {
        let values = raw
            .variables
            .get(name)
            .filter(|values| values.len() == raw.time.len())
            .ok_or_else(|| {
                PipelineError::DataProcessing(format!("weather column '{name}' missing or short"))
            })?;
        columns.push(Series::new(name, values.as_slice()));
    }

    let frame = DataFrame::new(columns)?;
    let subset = [TIMESTAMP_COL.to_string()];
    let unique = frame.unique_stable(Some(&subset[..]), UniqueKeepStrategy::First, None)?;
    if unique.height() < frame.height() {
        warn!(
            dropped = frame.height() - unique.height(),
            "duplicate weather timestamps, keeping the first rows"
        );
    }
    Ok(unique.sort([TIMESTAMP_COL], false, false)?)
}

/// Inner join of engineered weather and hourly inverter output on the
/// timestamp column, sorted by time.
pub fn merge_datasets(weather: &DataFrame, inverter: &DataFrame) -> PipelineResult<DataFrame> {
    let merged = weather
        .clone()
        .lazy()
        .inner_join(inverter.clone().lazy(), col(TIMESTAMP_COL), col(TIMESTAMP_COL))
        .collect()?;
    Ok(merged.sort([TIMESTAMP_COL], false, false)?)
}

/// Run the whole chain. With `inverter` the result carries its target
/// column; without it only the engineered weather rows come back.
pub fn preprocess_datasets(
    weather: &RawWeatherTable,
    suntimes: &SunTimesTable,
    inverter: Option<&DataFrame>,
) -> PipelineResult<DataFrame> {
    let weather = clean_weather(weather)?;
    debug!(rows = weather.height(), "weather cleaned");

    let windows = clean_suntimes(suntimes);
    let weather = filter_daylight(weather, &windows)?;
    debug!(rows = weather.height(), dates = windows.len(), "daylight filter applied");

    let weather = engineer_features(weather)?;
    debug!(rows = weather.height(), "features engineered");

    match inverter {
        Some(inverter) => {
            let merged = merge_datasets(&weather, inverter)?;
            debug!(
                weather_rows = weather.height(),
                inverter_rows = inverter.height(),
                merged_rows = merged.height(),
                "weather and inverter merged"
            );
            Ok(merged)
        }
        None => Ok(weather),
    }
}
