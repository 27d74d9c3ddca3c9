//! Weather data integration (Open-Meteo)
//!
//! Hourly irradiance and cloud variables for a coordinate and date window.
//! Two upstream endpoints cover different spans: the historical-forecast
//! archive for windows starting more than [`HISTORICAL_THRESHOLD_DAYS`] ago,
//! and the regular forecast endpoint (up to 92 past days and 16 forecast
//! days) for everything else. Which one is used is policy, decided by
//! [`plan_weather_request`].

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, error, info};

use super::cache::TtlCache;
use crate::config::WeatherConfig;
use crate::error::{PipelineError, PipelineResult};

/// Hourly variables requested from the provider, in column order.
pub const WEATHER_VARIABLES: [&str; 7] = [
    "global_tilted_irradiance_instant",
    "global_tilted_irradiance",
    "cloud_cover_mid",
    "cloud_cover_high",
    "uv_index",
    "diffuse_radiation",
    "direct_radiation_instant",
];

/// Windows starting further back than this go to the historical endpoint.
pub const HISTORICAL_THRESHOLD_DAYS: i64 = 92;
/// Most past days the forecast endpoint serves.
pub const MAX_PAST_DAYS: i64 = 92;
/// Most forecast days (today included) the forecast endpoint serves.
pub const MAX_FORECAST_DAYS: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum WeatherSource {
    Historical,
    Forecast,
}

/// How the requested window is expressed to the chosen endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherWindow {
    Dates { start: NaiveDate, end: NaiveDate },
    Relative { past_days: i64, forecast_days: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherRequestPlan {
    pub source: WeatherSource,
    pub window: WeatherWindow,
}

impl WeatherRequestPlan {
    /// Dates the endpoint returns rows for when asked on `today`.
    ///
    /// A relative window counts today as the first forecast day.
    pub fn coverage(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self.window {
            WeatherWindow::Dates { start, end } => (start, end),
            WeatherWindow::Relative {
                past_days,
                forecast_days,
            } => (
                today - chrono::Duration::days(past_days),
                today + chrono::Duration::days(forecast_days - 1),
            ),
        }
    }
}

/// Choose the endpoint and its window for `[start, end]` as seen on `today`.
pub fn plan_weather_request(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> PipelineResult<WeatherRequestPlan> {
    if start > end {
        return Err(PipelineError::InvalidRange { start, end });
    }

    let days_before = (today - start).num_days();
    let days_after = (end - today).num_days();

    if -days_before >= MAX_FORECAST_DAYS {
        return Err(PipelineError::DataProcessing(format!(
            "weather window {start}..{end} starts beyond the {MAX_FORECAST_DAYS}-day forecast horizon"
        )));
    }

    if days_before > HISTORICAL_THRESHOLD_DAYS {
        return Ok(WeatherRequestPlan {
            source: WeatherSource::Historical,
            window: WeatherWindow::Dates {
                start,
                end: end.min(today),
            },
        });
    }

    Ok(WeatherRequestPlan {
        source: WeatherSource::Forecast,
        window: WeatherWindow::Relative {
            past_days: days_before.clamp(0, MAX_PAST_DAYS),
            forecast_days: days_after.clamp(0, MAX_FORECAST_DAYS),
        },
    })
}

/// Hourly rows as delivered by the provider: local wall-clock timestamps
/// (no offset) and one column per variable, `None` where the provider has
/// no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherTable {
    pub time: Vec<String>,
    pub variables: BTreeMap<String, Vec<Option<f64>>>,
}

impl RawWeatherTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Keep rows whose calendar date lies in `[start, end]`.
    pub fn restrict_to(&self, start: NaiveDate, end: NaiveDate) -> RawWeatherTable {
        let keep: Vec<bool> = self
            .time
            .iter()
            .map(|t| {
                t.get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .is_some_and(|d| d >= start && d <= end)
            })
            .collect();

        let pick = |values: &Vec<Option<f64>>| -> Vec<Option<f64>> {
            values
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect()
        };

        RawWeatherTable {
            time: self
                .time
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(t, _)| t.clone())
                .collect(),
            variables: self
                .variables
                .iter()
                .map(|(name, values)| (name.clone(), pick(values)))
                .collect(),
        }
    }
}

#[async_trait]
pub trait WeatherDataProvider: Send + Sync {
    /// Hourly weather for every hour of `[start, end]` (dates inclusive).
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<RawWeatherTable>;
}

/// Open-Meteo client with transient-error retries and a shared response cache.
#[derive(Clone)]
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    forecast_url: String,
    historical_url: String,
    query_timezone: String,
    site_timezone: Tz,
    cache: TtlCache<String, RawWeatherTable>,
}

impl OpenMeteoClient {
    pub fn new(cfg: &WeatherConfig, site_timezone: Tz) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent("solar-forecast/0.2")
            .build()
            .map_err(|e| PipelineError::DataProcessing(format!("HTTP client setup failed: {e}")))?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                Duration::from_millis(cfg.retry_min_backoff_ms),
                Duration::from_millis(cfg.retry_max_backoff_ms),
            )
            .build_with_max_retries(cfg.max_retries);

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            forecast_url: cfg.forecast_url.clone(),
            historical_url: cfg.historical_url.clone(),
            query_timezone: cfg.query_timezone.clone(),
            site_timezone,
            cache: TtlCache::new(Duration::from_secs(cfg.cache_ttl_secs)),
        })
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.site_timezone).date_naive()
    }

    fn build_query(
        &self,
        latitude: f64,
        longitude: f64,
        window: WeatherWindow,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("timezone", self.query_timezone.clone()),
            ("hourly", WEATHER_VARIABLES.join(",")),
        ];
        match window {
            WeatherWindow::Dates { start, end } => {
                query.push(("start_date", start.format("%Y-%m-%d").to_string()));
                query.push(("end_date", end.format("%Y-%m-%d").to_string()));
            }
            WeatherWindow::Relative {
                past_days,
                forecast_days,
            } => {
                query.push(("past_days", past_days.to_string()));
                query.push(("forecast_days", forecast_days.to_string()));
            }
        }
        query
    }

    async fn fetch_raw(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> PipelineResult<RawWeatherTable> {
        let cache_key = format!(
            "{url}?{}",
            query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        );
        if let Some(hit) = self.cache.get(&cache_key).await {
            debug!(url, "weather cache hit");
            return Ok(hit);
        }

        let response = self.client.get(url).query(query).send().await.map_err(|e| {
            error!(url, error = %e, "weather request failed after retries");
            PipelineError::DataProcessing(format!("weather request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url, %status, "weather provider returned an error");
            return Err(PipelineError::DataProcessing(format!(
                "weather provider error: HTTP {status}: {body}"
            )));
        }

        let payload: OpenMeteoResponse = response.json().await.map_err(|e| {
            PipelineError::DataProcessing(format!("failed to decode weather response: {e}"))
        })?;
        let table = payload.into_table()?;

        self.cache.insert(cache_key, table.clone()).await;
        Ok(table)
    }
}

#[async_trait]
impl WeatherDataProvider for OpenMeteoClient {
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<RawWeatherTable> {
        let today = self.today();
        let plan = plan_weather_request(start, end, today)?;
        let url = match plan.source {
            WeatherSource::Historical => &self.historical_url,
            WeatherSource::Forecast => &self.forecast_url,
        };
        info!(
            source = %plan.source,
            %start,
            %end,
            latitude,
            longitude,
            "fetching hourly weather"
        );

        let query = self.build_query(latitude, longitude, plan.window);
        let (covered_from, covered_to) = plan.coverage(today);
        let table = self
            .fetch_raw(url, &query)
            .await?
            .restrict_to(start.max(covered_from), end.min(covered_to));
        if table.is_empty() {
            return Err(PipelineError::DataProcessing(format!(
                "no weather data available for {start}..{end}"
            )));
        }
        debug!(rows = table.len(), "weather rows in window");
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: Option<OpenMeteoHourly>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    #[serde(flatten)]
    variables: BTreeMap<String, Vec<Option<f64>>>,
}

impl OpenMeteoResponse {
    fn into_table(self) -> PipelineResult<RawWeatherTable> {
        let hourly = self.hourly.ok_or_else(|| {
            PipelineError::DataProcessing("weather response has no hourly block".to_string())
        })?;

        let mut variables = BTreeMap::new();
        for name in WEATHER_VARIABLES {
            let values = hourly.variables.get(name).ok_or_else(|| {
                PipelineError::DataProcessing(format!("weather response lacks '{name}'"))
            })?;
            if values.len() != hourly.time.len() {
                return Err(PipelineError::DataProcessing(format!(
                    "weather variable '{name}' has {} values for {} timestamps",
                    values.len(),
                    hourly.time.len()
                )));
            }
            variables.insert(name.to_string(), values.clone());
        }

        Ok(RawWeatherTable {
            time: hourly.time,
            variables,
        })
    }
}
