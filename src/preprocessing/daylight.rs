//! Daylight mask built from the sun times table.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::domain::{date_series, datetime_series, TIMESTAMP_COL};
use crate::error::PipelineResult;
use crate::forecast::SunTimesTable;

/// Slack added on both sides of sunrise / sunset. Hourly timestamps sit on
/// the hour while rise and set fall anywhere inside it.
pub const DAYLIGHT_PADDING_HOURS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaylightWindow {
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

impl DaylightWindow {
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        let pad = Duration::hours(DAYLIGHT_PADDING_HOURS);
        self.sunrise - pad <= *timestamp && *timestamp <= self.sunset + pad
    }
}

/// Full local datetimes of sunrise / sunset, indexed by date.
pub fn clean_suntimes(table: &SunTimesTable) -> BTreeMap<NaiveDate, DaylightWindow> {
    table
        .records
        .iter()
        .map(|r| {
            (
                r.date,
                DaylightWindow {
                    sunrise: r.date.and_time(r.sunrise),
                    sunset: r.date.and_time(r.sunset),
                },
            )
        })
        .collect()
}

const DATE_COL: &str = "date";
const WINDOW_START_COL: &str = "daylight_start";
const WINDOW_END_COL: &str = "daylight_end";

/// Padded windows as a frame keyed by date, ready to join on.
fn windows_frame(windows: &BTreeMap<NaiveDate, DaylightWindow>) -> PipelineResult<DataFrame> {
    let pad = Duration::hours(DAYLIGHT_PADDING_HOURS);
    let dates: Vec<NaiveDate> = windows.keys().copied().collect();
    let starts: Vec<NaiveDateTime> = windows.values().map(|w| w.sunrise - pad).collect();
    let ends: Vec<NaiveDateTime> = windows.values().map(|w| w.sunset + pad).collect();

    Ok(DataFrame::new(vec![
        date_series(DATE_COL, &dates)?,
        datetime_series(WINDOW_START_COL, &starts)?,
        datetime_series(WINDOW_END_COL, &ends)?,
    ])?)
}

/// Keep rows inside the padded daylight window of their own date. Dates
/// missing from `windows` lose all their rows.
pub fn filter_daylight(
    frame: DataFrame,
    windows: &BTreeMap<NaiveDate, DaylightWindow>,
) -> PipelineResult<DataFrame> {
    let columns: Vec<Expr> = frame.get_column_names().into_iter().map(col).collect();
    let ts = || col(TIMESTAMP_COL);

    let out = frame
        .lazy()
        .with_column(ts().dt().date().alias(DATE_COL))
        .inner_join(windows_frame(windows)?.lazy(), col(DATE_COL), col(DATE_COL))
        .filter(
            ts().gt_eq(col(WINDOW_START_COL))
                .and(ts().lt_eq(col(WINDOW_END_COL))),
        )
        .select(columns)
        .collect()?;
    Ok(out.sort([TIMESTAMP_COL], false, false)?)
}
