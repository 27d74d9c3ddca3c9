//! Sunrise / sunset times per calendar date
//!
//! Rise and set are computed with NREL's SPA for an airless atmosphere
//! (no pressure-dependent refraction model). The horizon is the standard
//! rise/set horizon: 34' of refraction depression plus the solar
//! semi-diameter, so the events mark the sun's upper limb crossing 34'
//! below the geometric horizon. It is a physical constant, not a setting.

use chrono::{Days, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use solar_positioning::{spa, time::DeltaT, Horizon, SunriseResult};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Rise / set horizon used for every computation.
const RISE_SET_HORIZON: Horizon = Horizon::SunriseSunset;

/// Where the sun is observed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level. Carried for completeness: with an airless
    /// atmosphere it does not move the rise/set horizon.
    pub altitude: f64,
}

/// Sunrise and sunset on one date, as naive local times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimesRecord {
    pub date: NaiveDate,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// One row per date, ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunTimesTable {
    pub records: Vec<SunTimesRecord>,
}

impl SunTimesTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&SunTimesRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.records[i])
    }
}

pub trait SunTimesProvider: Send + Sync {
    /// Sunrise / sunset for a single date, `None` during polar night.
    fn sun_times(
        &self,
        observer: &Observer,
        timezone: Tz,
        date: NaiveDate,
    ) -> PipelineResult<Option<SunTimesRecord>>;

    /// Every date of `[start, end]`, both inclusive.
    fn sun_times_by_date(
        &self,
        observer: &Observer,
        timezone: Tz,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<SunTimesTable> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }

        let mut records = Vec::new();
        let mut date = start;
        while date <= end {
            match self.sun_times(observer, timezone, date)? {
                Some(record) => records.push(record),
                None => debug!(%date, "sun stays below the horizon, date skipped"),
            }
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| PipelineError::DataProcessing(format!("date overflow after {date}")))?;
        }
        Ok(SunTimesTable { records })
    }
}

/// SPA-based provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaSunTimes;

impl SunTimesProvider for SpaSunTimes {
    fn sun_times(
        &self,
        observer: &Observer,
        timezone: Tz,
        date: NaiveDate,
    ) -> PipelineResult<Option<SunTimesRecord>> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| timezone.from_local_datetime(&dt).earliest())
            .ok_or_else(|| {
                PipelineError::DataProcessing(format!("no local midnight on {date} in {timezone}"))
            })?
            .fixed_offset();

        let delta_t = DeltaT::estimate_from_date_like(midnight).map_err(|e| {
            PipelineError::DataProcessing(format!("delta T estimate failed for {date}: {e:?}"))
        })?;

        let result = spa::sunrise_sunset_for_horizon(
            midnight,
            observer.latitude,
            observer.longitude,
            delta_t,
            RISE_SET_HORIZON,
        )
        .map_err(|e| {
            PipelineError::DataProcessing(format!("sun position failed for {date}: {e:?}"))
        })?;

        let record = match result {
            SunriseResult::RegularDay {
                sunrise, sunset, ..
            } => SunTimesRecord {
                date,
                sunrise: truncate_seconds(sunrise.with_timezone(&timezone).time()),
                sunset: truncate_seconds(sunset.with_timezone(&timezone).time()),
            },
            SunriseResult::AllDay { .. } => {
                warn!(%date, latitude = observer.latitude, "polar day: whole date treated as daylight");
                SunTimesRecord {
                    date,
                    sunrise: NaiveTime::MIN,
                    sunset: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
                }
            }
            SunriseResult::AllNight { .. } => return Ok(None),
        };
        Ok(Some(record))
    }
}

fn truncate_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}
