//! Forecast models
//!
//! A model family implements [`ForecastModel`]: fit on a training frame,
//! predict on an inference frame, persist its full state. Families are
//! looked up by name through [`registry::ModelRegistry`].

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use polars::prelude::DataFrame;
use crate::error::PipelineResult;

pub mod config;
pub mod neural_network;
pub mod registry;
pub mod scaler;
pub mod training;

pub use config::{Device, ModelConfig, ModelFamily, NeuralNetworkParams, OutputBounds};
pub use neural_network::NeuralNetworkModel;
pub use registry::ModelRegistry;
pub use scaler::StandardScaler;
pub use training::{SplitSnapshot, TrainValSplit};

/// Validation Metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLoss {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: f64,
}

/// Outcome of one `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub train_rows: usize,
    pub validation_rows: usize,
    pub epochs: Vec<EpochLoss>,
    /// On the held-out rows, in physical units.
    pub metrics: ValidationMetrics,
}

pub trait ForecastModel: Send + Sync {
    fn family(&self) -> ModelFamily;

    fn config(&self) -> &ModelConfig;

    fn is_trained(&self) -> bool;

    /// Train from scratch on `frame` (features plus target column).
    /// Fewer than `val_size + 1` rows is `TrainSize`.
    fn fit(&mut self, frame: &DataFrame) -> PipelineResult<TrainingSummary>;

    /// One clamped value per row of `frame`. Empty frames are `TestSize`,
    /// an untrained model is `NotTrained`.
    fn predict(&self, frame: &DataFrame) -> PipelineResult<BTreeMap<NaiveDateTime, f64>>;

    /// Persist the full state under `dir`, returning the artifact path.
    fn save(&self, dir: &Path) -> PipelineResult<PathBuf>;

    /// Train / validation hours of the last fit, for diagnostics.
    fn last_split(&self) -> Option<&SplitSnapshot>;

    fn last_metrics(&self) -> Option<&ValidationMetrics>;
}
