//! Training and inference data preparation.
//!
//! `DataProcessor` owns the two outbound providers and turns a request into
//! a model-ready `DataFrame`: training frames carry the target column,
//! inference frames only the engineered weather.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Tz;
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument};

use crate::domain::{timestamps, PanelMetadata, PanelOutputSample};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::{Observer, SunTimesProvider, WeatherDataProvider};
use crate::preprocessing::{preprocess_datasets, resample_hourly};

pub struct DataProcessor {
    suntimes: Arc<dyn SunTimesProvider>,
    weather: Arc<dyn WeatherDataProvider>,
    timezone: Tz,
    target_col: String,
    min_training_rows: usize,
}

impl DataProcessor {
    /// `min_training_rows` is the smallest number of hourly rows a training
    /// request must resample to (`val_size + 1` for the configured model).
    pub fn new(
        suntimes: Arc<dyn SunTimesProvider>,
        weather: Arc<dyn WeatherDataProvider>,
        timezone: Tz,
        target_col: impl Into<String>,
        min_training_rows: usize,
    ) -> Self {
        Self {
            suntimes,
            weather,
            timezone,
            target_col: target_col.into(),
            min_training_rows,
        }
    }

    /// Current date at the site.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    fn observer(metadata: &PanelMetadata) -> Observer {
        Observer {
            latitude: metadata.latitude,
            longitude: metadata.longitude,
            altitude: metadata.altitude,
        }
    }

    /// Resample the samples to hourly means, fetch sun times and weather for
    /// the dates they span and return the merged frame.
    #[instrument(skip_all, fields(inverter_id = %metadata.inverter_id, samples = samples.len()))]
    pub async fn prepare_training_data(
        &self,
        metadata: &PanelMetadata,
        samples: &[PanelOutputSample],
    ) -> PipelineResult<DataFrame> {
        if samples.is_empty() {
            return Err(PipelineError::Validation(
                "panel_output must contain at least one sample".to_string(),
            ));
        }

        let inverter = resample_hourly(samples, &self.target_col)?;
        if inverter.height() < self.min_training_rows {
            return Err(PipelineError::Validation(format!(
                "panel_output resamples to {} hourly rows, need at least {}",
                inverter.height(),
                self.min_training_rows
            )));
        }

        let hours = timestamps(&inverter)?;
        let (start, end) = match (hours.first(), hours.last()) {
            (Some(first), Some(last)) => (first.date(), last.date()),
            _ => {
                return Err(PipelineError::Validation(
                    "panel_output has no usable readings".to_string(),
                ))
            }
        };
        info!(%start, %end, hourly_rows = inverter.height(), "preparing training data");

        let observer = Self::observer(metadata);
        let suntimes = self
            .suntimes
            .sun_times_by_date(&observer, self.timezone, start, end)?;
        let weather = self
            .weather
            .fetch_hourly(metadata.latitude, metadata.longitude, start, end)
            .await?;

        let merged = preprocess_datasets(&weather, &suntimes, Some(&inverter))?;
        if merged.height() == 0 {
            return Err(PipelineError::DataProcessing(format!(
                "no daylight hours with both weather and inverter data between {start} and {end}"
            )));
        }
        debug!(rows = merged.height(), "training frame ready");
        Ok(merged)
    }

    /// Engineered weather for `[today + 1, today + 1 + predict_days]`.
    pub async fn prepare_inference_data(&self, metadata: &PanelMetadata) -> PipelineResult<DataFrame> {
        self.prepare_inference_data_at(metadata, self.today()).await
    }

    #[instrument(skip_all, fields(inverter_id = %metadata.inverter_id, today = %today))]
    pub async fn prepare_inference_data_at(
        &self,
        metadata: &PanelMetadata,
        today: NaiveDate,
    ) -> PipelineResult<DataFrame> {
        let (start, end) = prediction_dates(today, metadata.horizon_days()?)?;
        info!(%start, %end, "preparing inference data");

        let observer = Self::observer(metadata);
        let suntimes = self
            .suntimes
            .sun_times_by_date(&observer, self.timezone, start, end)?;
        let weather = self
            .weather
            .fetch_hourly(metadata.latitude, metadata.longitude, start, end)
            .await?;

        let frame = preprocess_datasets(&weather, &suntimes, None)?;
        debug!(rows = frame.height(), "inference frame ready");
        Ok(frame)
    }
}

/// Tomorrow, and tomorrow plus the horizon.
pub fn prediction_dates(today: NaiveDate, predict_days: i64) -> PipelineResult<(NaiveDate, NaiveDate)> {
    let days = u64::try_from(predict_days)
        .map_err(|_| PipelineError::Validation(format!("invalid predict_days {predict_days}")))?;
    let start = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| PipelineError::Validation(format!("no date after {today}")))?;
    let end = start
        .checked_add_days(Days::new(days))
        .ok_or_else(|| PipelineError::Validation(format!("horizon overflows from {start}")))?;
    Ok((start, end))
}
