//! Immutable model configuration
//!
//! `ModelSettings` (the config file section) leaves most fields optional;
//! `ModelConfig::resolve` fills them from the per-family defaults once,
//! validates the result and hands a frozen struct to the model.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

use crate::config::ModelSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::preprocessing::default_feature_columns;

/// Model families known to the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    NeuralNetwork,
}

impl ModelFamily {
    pub fn parse(name: &str) -> PipelineResult<Self> {
        name.trim()
            .parse()
            .map_err(|_| PipelineError::UnknownModelFamily(name.to_string()))
    }
}

/// Compute device. Only the CPU backend exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    fn from_setting(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("cpu") => Device::Cpu,
            Some(other) => {
                warn!(device = other, "unsupported device requested, running on cpu");
                Device::Cpu
            }
        }
    }
}

/// Physical range of the forecast output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutputBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetworkParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub dropout_rate: f64,
    pub hidden_layers: Vec<usize>,
}

impl Default for NeuralNetworkParams {
    fn default() -> Self {
        Self {
            epochs: 14,
            batch_size: 32,
            learning_rate: 0.002,
            dropout_rate: 0.1,
            hidden_layers: vec![64, 32],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub family: ModelFamily,
    /// Rows held out (from the end) for validation.
    pub val_size: usize,
    /// Exclude the held-out rows from fitting.
    pub separate_val_set: bool,
    pub target_col: String,
    pub features: Vec<String>,
    pub normalize: bool,
    pub deterministic: bool,
    pub seed: u64,
    pub device: Device,
    pub bounds: OutputBounds,
    /// Divisor of the absolute error in the training loss (nameplate capacity).
    pub loss_scale_factor: f64,
    pub network: NeuralNetworkParams,
}

impl ModelConfig {
    pub const DEFAULT_VAL_SIZE: usize = 44;
    pub const DEFAULT_TARGET: &'static str = "solar_power";
    pub const DEFAULT_SEED: u64 = 42;

    /// Defaults of `family` with the given output bounds.
    pub fn defaults(family: ModelFamily, bounds: OutputBounds) -> Self {
        match family {
            ModelFamily::NeuralNetwork => Self {
                family,
                val_size: Self::DEFAULT_VAL_SIZE,
                separate_val_set: false,
                target_col: Self::DEFAULT_TARGET.to_string(),
                features: default_feature_columns(),
                normalize: true,
                deterministic: true,
                seed: Self::DEFAULT_SEED,
                device: Device::Cpu,
                bounds,
                loss_scale_factor: bounds.upper,
                network: NeuralNetworkParams::default(),
            },
        }
    }

    /// Freeze the config file section into a validated configuration.
    pub fn resolve(settings: &ModelSettings) -> PipelineResult<Self> {
        let family = ModelFamily::parse(&settings.family)?;
        let bounds = OutputBounds {
            lower: settings.lower_bound,
            upper: settings.upper_bound,
        };
        let mut cfg = Self::defaults(family, bounds);

        if let Some(v) = settings.val_size {
            cfg.val_size = v;
        }
        if let Some(v) = settings.separate_val_set {
            cfg.separate_val_set = v;
        }
        if let Some(v) = &settings.target_col {
            cfg.target_col = v.clone();
        }
        if let Some(v) = &settings.features {
            cfg.features = v.clone();
        }
        if let Some(v) = settings.normalize {
            cfg.normalize = v;
        }
        if let Some(v) = settings.deterministic {
            cfg.deterministic = v;
        }
        if let Some(v) = settings.seed {
            cfg.seed = v;
        }
        if let Some(v) = settings.loss_scale_factor {
            cfg.loss_scale_factor = v;
        }
        cfg.device = Device::from_setting(settings.device.as_deref());

        let net = &mut cfg.network;
        if let Some(v) = settings.epochs {
            net.epochs = v;
        }
        if let Some(v) = settings.batch_size {
            net.batch_size = v;
        }
        if let Some(v) = settings.learning_rate {
            net.learning_rate = v;
        }
        if let Some(v) = settings.dropout_rate {
            net.dropout_rate = v;
        }
        if let Some(v) = &settings.hidden_layers {
            net.hidden_layers = v.clone();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |msg: String| Err(PipelineError::Validation(format!("model config: {msg}")));

        if !(self.bounds.lower.is_finite() && self.bounds.upper.is_finite())
            || self.bounds.lower > self.bounds.upper
        {
            return fail(format!(
                "bounds [{}, {}] are not an ordered finite range",
                self.bounds.lower, self.bounds.upper
            ));
        }
        if self.val_size == 0 {
            return fail("val_size must be positive".to_string());
        }
        if self.features.is_empty() {
            return fail("feature list is empty".to_string());
        }
        if self.features.iter().any(|f| f == &self.target_col) {
            return fail(format!("target '{}' is listed as a feature", self.target_col));
        }
        if !(self.loss_scale_factor.is_finite() && self.loss_scale_factor > 0.0) {
            return fail(format!(
                "loss_scale_factor must be positive, got {}",
                self.loss_scale_factor
            ));
        }

        let net = &self.network;
        if net.epochs == 0 || net.batch_size == 0 {
            return fail("epochs and batch_size must be positive".to_string());
        }
        if !(net.learning_rate.is_finite() && net.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", net.learning_rate));
        }
        if !(0.0..1.0).contains(&net.dropout_rate) {
            return fail(format!("dropout_rate must be in [0, 1), got {}", net.dropout_rate));
        }
        if net.hidden_layers.iter().any(|&width| width == 0) {
            return fail("hidden layer widths must be positive".to_string());
        }
        Ok(())
    }

    /// Smallest frame `fit` accepts.
    pub fn min_training_rows(&self) -> usize {
        self.val_size + 1
    }
}
