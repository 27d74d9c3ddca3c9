#![allow(dead_code)]

use std::{f64::consts::PI, path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use solar_forecast::{
    config::Config,
    domain::{PanelMetadata, PanelOutputSample},
    forecast::{plan_weather_request, RawWeatherTable, SpaSunTimes, WeatherDataProvider, WEATHER_VARIABLES},
    ml::{ModelConfig, ModelRegistry},
    pipeline::DataProcessor,
    service::AppState,
    PipelineResult,
};

pub const SITE_TZ: chrono_tz::Tz = chrono_tz::Asia::Seoul;

pub fn site_today() -> NaiveDate {
    Utc::now().with_timezone(&SITE_TZ).date_naive()
}

/// Clear-sky-ish irradiance peaking at local noon.
pub fn irradiance(ts: NaiveDateTime) -> f64 {
    let hour = f64::from(ts.hour());
    (PI * (hour - 6.0) / 12.0).sin().max(0.0) * 800.0
}

/// Output of a 25 kW plant under `irradiance`.
pub fn plant_output(ts: NaiveDateTime) -> f64 {
    irradiance(ts) * 0.03
}

/// Deterministic weather that honours the provider's coverage rules: the
/// forecast source only reaches `forecast_days - 1` days past today.
pub struct SyntheticWeather {
    pub today: NaiveDate,
}

#[async_trait]
impl WeatherDataProvider for SyntheticWeather {
    async fn fetch_hourly(
        &self,
        _latitude: f64,
        _longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<RawWeatherTable> {
        let plan = plan_weather_request(start, end, self.today)?;
        let (from, to) = plan.coverage(self.today);
        let (from, to) = (start.max(from), end.min(to));

        let stamps: Vec<NaiveDateTime> = from
            .iter_days()
            .take_while(|d| *d <= to)
            .flat_map(|d| (0..24).map(move |h| d.and_hms_opt(h, 0, 0).unwrap()))
            .collect();

        let mut table = RawWeatherTable {
            time: stamps.iter().map(|t| t.format("%Y-%m-%dT%H:%M").to_string()).collect(),
            ..RawWeatherTable::default()
        };
        for name in WEATHER_VARIABLES {
            let values = stamps
                .iter()
                .map(|ts| {
                    let g = irradiance(*ts);
                    Some(match name {
                        "cloud_cover_mid" | "cloud_cover_high" => 10.0,
                        "uv_index" => g / 100.0,
                        "diffuse_radiation" => g * 0.2,
                        _ => g,
                    })
                })
                .collect();
            table.variables.insert(name.to_string(), values);
        }
        Ok(table)
    }
}

pub fn seoul_panel(predict_days: Option<i64>) -> PanelMetadata {
    PanelMetadata {
        inverter_id: "inv-001".to_string(),
        plant_id: "plant-seoul".to_string(),
        latitude: 37.5,
        longitude: 126.9,
        altitude: 100.0,
        predict_days,
    }
}

/// Hourly samples for the `days` days before `today`.
pub fn hourly_samples(today: NaiveDate, days: u64) -> Vec<PanelOutputSample> {
    let first = today - chrono::Days::new(days);
    first
        .iter_days()
        .take_while(|d| *d < today)
        .flat_map(|d| (0..24).map(move |h| d.and_hms_opt(h, 0, 0).unwrap()))
        .map(|ts| PanelOutputSample {
            timestamp: ts,
            solar_power: plant_output(ts),
        })
        .collect()
}

/// Config rooted in `volume`, with a small, fast network.
pub fn test_config(volume: &Path, val_size: usize, epochs: usize) -> Config {
    Config::from_toml_str(&format!(
        r#"
        [storage]
        volume_path = "{volume}"
        model_dir = "{volume}/models"

        [model]
        family = "neural_network"
        lower_bound = 0.0
        upper_bound = 40.0
        val_size = {val_size}
        epochs = {epochs}
        hidden_layers = [16, 8]
        "#,
        volume = volume.display(),
    ))
    .unwrap()
}

/// State wired to SPA sun times and synthetic weather, with an untrained model.
pub fn test_state(cfg: Config) -> AppState {
    let model_config = ModelConfig::resolve(&cfg.model).unwrap();
    let processor = DataProcessor::new(
        Arc::new(SpaSunTimes),
        Arc::new(SyntheticWeather { today: site_today() }),
        SITE_TZ,
        model_config.target_col.clone(),
        model_config.min_training_rows(),
    );
    let model = ModelRegistry::default().create(model_config).unwrap();
    AppState::new(cfg, model, processor)
}
