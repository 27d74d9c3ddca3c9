//! Process-wide state behind the HTTP handlers.
//!
//! One model per process. It sits behind a `parking_lot::RwLock`: `fit`
//! takes the write lock and `predict` the read lock, both on the blocking
//! pool, so a prediction never sees a half-trained model.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use strum::Display;
use tracing::{info, instrument};
use validator::Validate;

use crate::config::Config;
use crate::domain::{PanelMetadata, TrainingInput, TIMESTAMP_FORMAT};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::{OpenMeteoClient, SpaSunTimes};
use crate::ml::{ForecastModel, ModelConfig, ModelRegistry, TrainingSummary};
use crate::pipeline::DataProcessor;

/// How long the health check waits for a training run to release the model.
const HEALTH_LOCK_WAIT: Duration = Duration::from_millis(250);
const WRITE_PROBE_FILE: &str = ".write_probe";

pub type SharedModel = Arc<RwLock<Box<dyn ForecastModel>>>;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    model: SharedModel,
    processor: Arc<DataProcessor>,
}

impl AppState {
    pub fn new(cfg: Config, model: Box<dyn ForecastModel>, processor: DataProcessor) -> Self {
        Self {
            cfg: Arc::new(cfg),
            model: Arc::new(RwLock::new(model)),
            processor: Arc::new(processor),
        }
    }

    /// Production wiring: SPA sun times, Open-Meteo weather and the model
    /// persisted under `storage.model_dir` (or a fresh one).
    pub fn from_config(cfg: Config) -> Result<Self> {
        let timezone = cfg.site.tz()?;
        let model_config = ModelConfig::resolve(&cfg.model)?;
        let model_dir = cfg.storage.model_dir();
        let model = ModelRegistry::default().initialize_model(model_config, &model_dir)?;

        let weather = OpenMeteoClient::new(&cfg.weather, timezone)?;
        let processor = DataProcessor::new(
            Arc::new(SpaSunTimes),
            Arc::new(weather),
            timezone,
            model.config().target_col.clone(),
            model.config().min_training_rows(),
        );

        info!(
            family = %model.family(),
            trained = model.is_trained(),
            model_dir = %model_dir.display(),
            "model ready"
        );
        Ok(Self::new(cfg, model, processor))
    }

    pub fn model(&self) -> SharedModel {
        Arc::clone(&self.model)
    }

    #[instrument(skip_all, fields(inverter_id = %input.panel_metadata.inverter_id))]
    pub async fn train(&self, input: TrainingInput) -> PipelineResult<TrainingSummary> {
        input.check()?;
        let frame = self
            .processor
            .prepare_training_data(&input.panel_metadata, &input.panel_output)
            .await?;

        let model = self.model();
        let summary = tokio::task::spawn_blocking(move || model.write().fit(&frame))
            .await
            .map_err(|e| PipelineError::ModelTraining(format!("training task failed: {e}")))??;

        info!(
            train_rows = summary.train_rows,
            validation_rows = summary.validation_rows,
            mae = summary.metrics.mae,
            "training finished"
        );
        Ok(summary)
    }

    /// Forecast per daylight hour, keyed by local wall-clock timestamp.
    #[instrument(skip_all, fields(inverter_id = %metadata.inverter_id))]
    pub async fn predict(&self, metadata: PanelMetadata) -> PipelineResult<BTreeMap<String, f64>> {
        metadata.validate()?;
        metadata.horizon_days()?;

        let trained = self.model.read().is_trained();
        if !trained {
            return Err(PipelineError::NotTrained(
                "the model has not been trained yet".to_string(),
            ));
        }

        let frame = self.processor.prepare_inference_data(&metadata).await?;
        let model = self.model();
        let predictions = tokio::task::spawn_blocking(move || model.read().predict(&frame))
            .await
            .map_err(|e| PipelineError::ModelTraining(format!("prediction task failed: {e}")))??;

        info!(rows = predictions.len(), "prediction finished");
        Ok(predictions
            .into_iter()
            .map(|(ts, value)| (ts.format(TIMESTAMP_FORMAT).to_string(), value))
            .collect())
    }

    /// Persist the current model under `storage.model_dir`.
    pub fn save_model(&self) -> PipelineResult<PathBuf> {
        let dir = self.cfg.storage.model_dir();
        self.model.read().save(&dir)
    }

    pub fn healthcheck(&self) -> HealthReport {
        let model = self.check_model();
        let filesystem = self.check_filesystem();
        let is_healthy = model.is_healthy() && filesystem.is_healthy();
        HealthReport {
            status: if is_healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            is_healthy,
            details: HealthDetails { model, filesystem },
            timestamp: Utc::now(),
        }
    }

    fn check_model(&self) -> ComponentHealth {
        match self.model.try_read_for(HEALTH_LOCK_WAIT) {
            None => ComponentHealth::healthy("Model training in progress"),
            Some(model) if model.is_trained() => ComponentHealth::healthy("Model loaded and trained"),
            Some(_) => ComponentHealth::unhealthy("Model not trained"),
        }
    }

    fn check_filesystem(&self) -> ComponentHealth {
        let model_dir = self.cfg.storage.model_dir();
        if !model_dir.is_dir() {
            return ComponentHealth::unhealthy(format!(
                "Model directory not found: {}",
                model_dir.display()
            ));
        }
        if !is_writable(&model_dir) {
            return ComponentHealth::unhealthy(format!(
                "Model directory not writable: {}",
                model_dir.display()
            ));
        }
        let log_dir = self.cfg.storage.log_dir();
        if !log_dir.is_dir() {
            return ComponentHealth::unhealthy(format!(
                "Log directory not found: {}",
                log_dir.display()
            ));
        }
        ComponentHealth::healthy("File system accessible")
    }
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(WRITE_PROBE_FILE);
    let writable = fs::write(&probe, b"").is_ok();
    let _ = fs::remove_file(&probe);
    writable
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub details: String,
}

impl ComponentHealth {
    fn healthy(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            details: details.into(),
        }
    }

    fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            details: details.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub model: ComponentHealth,
    pub filesystem: ComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub is_healthy: bool,
    pub details: HealthDetails,
    pub timestamp: DateTime<Utc>,
}
