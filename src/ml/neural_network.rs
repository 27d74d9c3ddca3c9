//! Feed-forward regression network
//!
//! A small multilayer perceptron (ReLU hidden layers, linear output) fitted
//! with Adam on shuffled mini-batches. The loss is the mean absolute error
//! in physical units divided by the configured scale factor (nameplate
//! capacity), so it reads as a fraction of rated output even though the
//! network itself sees standardized targets.
//!
//! The whole model (weights, both scalers, configuration, split snapshot and
//! trained flag) is persisted as one bincode artifact per family.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use polars::prelude::DataFrame;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{ModelConfig, ModelFamily, OutputBounds};
use super::scaler::StandardScaler;
use super::training::{calculate_metrics, minibatches, train_val_split, SplitSnapshot};
use super::{EpochLoss, ForecastModel, TrainingSummary, ValidationMetrics};
use crate::domain::{feature_matrix, timestamps};
use crate::error::{PipelineError, PipelineResult};

const ARTIFACT_VERSION: u32 = 1;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// `inputs x outputs`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl DenseLayer {
    /// He-normal weights, zero bias.
    fn init(inputs: usize, outputs: usize, rng: &mut StdRng) -> PipelineResult<Self> {
        let normal = Normal::new(0.0, (2.0 / inputs.max(1) as f64).sqrt())
            .map_err(|e| PipelineError::ModelTraining(format!("weight init failed: {e}")))?;
        Ok(Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| normal.sample(rng)),
            bias: Array1::zeros(outputs),
        })
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

/// Activations recorded by a training forward pass.
struct ForwardTrace {
    /// Input of every layer, the network input first.
    inputs: Vec<Array2<f64>>,
    /// Hidden layer pre-activations.
    pre_activations: Vec<Array2<f64>>,
    /// Hidden layer dropout masks, already scaled by `1 / keep`.
    masks: Vec<Array2<f64>>,
    output: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Mlp {
    layers: Vec<DenseLayer>,
}

impl Mlp {
    fn new(n_inputs: usize, hidden: &[usize], rng: &mut StdRng) -> PipelineResult<Self> {
        let widths: Vec<usize> = std::iter::once(n_inputs)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(1))
            .collect();
        let layers = widths
            .windows(2)
            .map(|w| DenseLayer::init(w[0], w[1], rng))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { layers })
    }

    fn n_inputs(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    /// Inference pass, no dropout.
    fn predict(&self, input: &Array2<f64>) -> Array1<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut activation = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&activation);
            activation = if i == last { z } else { z.mapv(relu) };
        }
        activation.column(0).to_owned()
    }

    fn forward_train(&self, input: &Array2<f64>, dropout: f64, rng: &mut StdRng) -> ForwardTrace {
        let keep = 1.0 - dropout;
        let (hidden, output_layer) = self.layers.split_at(self.layers.len() - 1);

        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(hidden.len());
        let mut masks = Vec::with_capacity(hidden.len());

        let mut activation = input.clone();
        for layer in hidden {
            let z = layer.forward(&activation);
            let mask = Array2::from_shape_fn(z.raw_dim(), |_| {
                if dropout > 0.0 && rng.gen::<f64>() < dropout {
                    0.0
                } else {
                    1.0 / keep
                }
            });
            let next = z.mapv(relu) * &mask;
            inputs.push(activation);
            pre_activations.push(z);
            masks.push(mask);
            activation = next;
        }

        let output = output_layer[0].forward(&activation);
        inputs.push(activation);
        ForwardTrace {
            inputs,
            pre_activations,
            masks,
            output,
        }
    }

    /// Weight and bias gradients per layer, given the loss gradient at the output.
    fn backward(&self, trace: &ForwardTrace, grad_output: Array2<f64>) -> Vec<(Array2<f64>, Array1<f64>)> {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut grad = grad_output;
        for idx in (0..self.layers.len()).rev() {
            grads.push((trace.inputs[idx].t().dot(&grad), grad.sum_axis(Axis(0))));
            if idx > 0 {
                let hidden = idx - 1;
                let relu_grad = trace.pre_activations[hidden].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                grad = grad.dot(&self.layers[idx].weights.t()) * &trace.masks[hidden] * &relu_grad;
            }
        }
        grads.reverse();
        grads
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

struct Adam {
    learning_rate: f64,
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    fn new(learning_rate: f64, network: &Mlp) -> Self {
        let moments = network
            .layers
            .iter()
            .map(|l| Moments {
                m_w: Array2::zeros(l.weights.raw_dim()),
                v_w: Array2::zeros(l.weights.raw_dim()),
                m_b: Array1::zeros(l.bias.raw_dim()),
                v_b: Array1::zeros(l.bias.raw_dim()),
            })
            .collect();
        Self {
            learning_rate,
            step: 0,
            moments,
        }
    }

    fn update(&mut self, network: &mut Mlp, grads: &[(Array2<f64>, Array1<f64>)]) {
        self.step += 1;
        let bias_correction1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bias_correction2 = 1.0 - ADAM_BETA2.powi(self.step);
        let step_size = self.learning_rate * bias_correction2.sqrt() / bias_correction1;

        for ((layer, (grad_w, grad_b)), m) in network
            .layers
            .iter_mut()
            .zip(grads)
            .zip(self.moments.iter_mut())
        {
            adam_step(&mut layer.weights, grad_w, &mut m.m_w, &mut m.v_w, step_size);
            adam_step(&mut layer.bias, grad_b, &mut m.m_b, &mut m.v_b, step_size);
        }
    }
}

fn adam_step<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    step_size: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            *p -= step_size * *m / (v.sqrt() + ADAM_EPSILON);
        });
}

/// `mean(|prediction - target|) / scale`
fn scaled_mae(predictions: &Array1<f64>, targets: &Array1<f64>, scale: f64) -> f64 {
    (predictions - targets).mapv(f64::abs).mean().unwrap_or(0.0) / scale
}

/// Gradient of [`scaled_mae`] with respect to a `batch x 1` output.
fn scaled_mae_gradient(output: &Array2<f64>, targets: &Array1<f64>, scale: f64) -> Array2<f64> {
    let n = targets.len().max(1) as f64;
    let sign = |d: f64| {
        if d > 0.0 {
            1.0
        } else if d < 0.0 {
            -1.0
        } else {
            0.0
        }
    };
    (&output.column(0) - targets)
        .mapv(|d| sign(d) / (n * scale))
        .insert_axis(Axis(1))
}

/// Divisor turning an error on the network's targets into a fraction of
/// capacity. Standardized targets are first brought back to physical units
/// by the target standard deviation.
fn loss_scale(capacity: f64, target_scaler: Option<&StandardScaler>) -> f64 {
    let target_std = target_scaler
        .and_then(|s| s.scale().first().copied())
        .unwrap_or(1.0);
    capacity / target_std
}

fn scale_with(scaler: Option<&StandardScaler>, data: Array2<f64>) -> PipelineResult<Array2<f64>> {
    match scaler {
        Some(s) => s.transform(&data),
        None => Ok(data),
    }
}

/// Physical-unit, clamped predictions for raw feature rows.
fn infer(
    network: &Mlp,
    input_scaler: Option<&StandardScaler>,
    target_scaler: Option<&StandardScaler>,
    bounds: OutputBounds,
    features: Array2<f64>,
) -> PipelineResult<Vec<f64>> {
    if features.ncols() != network.n_inputs() {
        return Err(PipelineError::DataProcessing(format!(
            "model expects {} features, got {}",
            network.n_inputs(),
            features.ncols()
        )));
    }
    let scaled = network
        .predict(&scale_with(input_scaler, features)?)
        .insert_axis(Axis(1));
    let physical = match target_scaler {
        Some(s) => s.inverse_transform(&scaled)?,
        None => scaled,
    };
    Ok(physical.column(0).iter().map(|&v| bounds.clamp(v)).collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetworkModel {
    config: ModelConfig,
    network: Option<Mlp>,
    input_scaler: Option<StandardScaler>,
    target_scaler: Option<StandardScaler>,
    is_trained: bool,
    last_split: Option<SplitSnapshot>,
    last_metrics: Option<ValidationMetrics>,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u32,
    model: &'a NeuralNetworkModel,
}

#[derive(Deserialize)]
struct Artifact {
    version: u32,
    model: NeuralNetworkModel,
}

impl NeuralNetworkModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            network: None,
            input_scaler: None,
            target_scaler: None,
            is_trained: false,
            last_split: None,
            last_metrics: None,
        }
    }

    pub fn artifact_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.bin", ModelFamily::NeuralNetwork))
    }

    /// Restore a model saved under `dir`. A missing artifact is
    /// `ModelNotFound`, anything unreadable is `Persistence`.
    pub fn load(dir: &Path) -> PipelineResult<Self> {
        let path = Self::artifact_path(dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ModelNotFound(path))
            }
            Err(e) => {
                return Err(PipelineError::Persistence(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        let artifact: Artifact = bincode::deserialize(&bytes).map_err(|e| {
            PipelineError::Persistence(format!("cannot decode {}: {e}", path.display()))
        })?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(PipelineError::Persistence(format!(
                "{} has artifact version {}, expected {ARTIFACT_VERSION}",
                path.display(),
                artifact.version
            )));
        }
        artifact.model.config.validate().map_err(|e| {
            PipelineError::Persistence(format!(
                "{} holds an invalid configuration: {e}",
                path.display()
            ))
        })?;
        match (&artifact.model.network, artifact.model.is_trained) {
            (None, true) => {
                return Err(PipelineError::Persistence(format!(
                    "{} is marked trained but holds no weights",
                    path.display()
                )))
            }
            (Some(network), _) if network.n_inputs() != artifact.model.config.features.len() => {
                return Err(PipelineError::Persistence(format!(
                    "{} has {} network inputs for {} configured features",
                    path.display(),
                    network.n_inputs(),
                    artifact.model.config.features.len()
                )))
            }
            _ => {}
        }

        info!(path = %path.display(), trained = artifact.model.is_trained, "model loaded");
        Ok(artifact.model)
    }

    fn rng(&self) -> StdRng {
        if self.config.deterministic {
            StdRng::seed_from_u64(self.config.seed)
        } else {
            StdRng::from_entropy()
        }
    }
}

impl ForecastModel for NeuralNetworkModel {
    fn family(&self) -> ModelFamily {
        ModelFamily::NeuralNetwork
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn fit(&mut self, frame: &DataFrame) -> PipelineResult<TrainingSummary> {
        let cfg = &self.config;
        let params = &cfg.network;
        let split = train_val_split(frame, cfg.val_size, cfg.separate_val_set)?;
        let target = std::slice::from_ref(&cfg.target_col);

        let x_train = feature_matrix(&split.train, &cfg.features)?;
        let y_train = feature_matrix(&split.train, target)?;
        let x_val = feature_matrix(&split.validation, &cfg.features)?;
        let y_val = feature_matrix(&split.validation, target)?;

        let (input_scaler, target_scaler) = if cfg.normalize {
            (
                Some(StandardScaler::fit(&x_train)?),
                Some(StandardScaler::fit(&y_train)?),
            )
        } else {
            (None, None)
        };

        let x_train_s = scale_with(input_scaler.as_ref(), x_train)?;
        let y_train_s = scale_with(target_scaler.as_ref(), y_train)?.column(0).to_owned();
        let x_val_s = scale_with(input_scaler.as_ref(), x_val.clone())?;
        let y_val_s = scale_with(target_scaler.as_ref(), y_val.clone())?
            .column(0)
            .to_owned();

        let mut rng = self.rng();
        let mut network = Mlp::new(cfg.features.len(), &params.hidden_layers, &mut rng)?;
        let mut optimizer = Adam::new(params.learning_rate, &network);
        let mut epochs = Vec::with_capacity(params.epochs);
        let loss_scale = loss_scale(cfg.loss_scale_factor, target_scaler.as_ref());

        info!(
            train_rows = split.train.height(),
            validation_rows = split.validation.height(),
            epochs = params.epochs,
            batch_size = params.batch_size,
            device = %cfg.device,
            "training neural network"
        );

        for epoch in 1..=params.epochs {
            for batch in minibatches(x_train_s.nrows(), params.batch_size, &mut rng, true) {
                let xb = x_train_s.select(Axis(0), &batch);
                let yb = y_train_s.select(Axis(0), &batch);
                let trace = network.forward_train(&xb, params.dropout_rate, &mut rng);
                let grad = scaled_mae_gradient(&trace.output, &yb, loss_scale);
                let grads = network.backward(&trace, grad);
                optimizer.update(&mut network, &grads);
            }

            let train_loss = scaled_mae(&network.predict(&x_train_s), &y_train_s, loss_scale);
            let validation_loss = scaled_mae(&network.predict(&x_val_s), &y_val_s, loss_scale);
            if !train_loss.is_finite() {
                return Err(PipelineError::ModelTraining(format!(
                    "training diverged at epoch {epoch}"
                )));
            }
            debug!(epoch, train_loss, validation_loss, "epoch finished");
            epochs.push(EpochLoss {
                epoch,
                train_loss,
                validation_loss,
            });
        }

        let val_predictions = infer(
            &network,
            input_scaler.as_ref(),
            target_scaler.as_ref(),
            cfg.bounds,
            x_val,
        )?;
        let metrics = calculate_metrics(&val_predictions, &y_val.column(0).to_vec())?;
        info!(
            mae = metrics.mae,
            rmse = metrics.rmse,
            mape = metrics.mape,
            r2 = metrics.r2,
            "validation metrics"
        );

        let summary = TrainingSummary {
            train_rows: split.train.height(),
            validation_rows: split.validation.height(),
            epochs,
            metrics: metrics.clone(),
        };

        self.network = Some(network);
        self.input_scaler = input_scaler;
        self.target_scaler = target_scaler;
        self.last_split = Some(split.snapshot()?);
        self.last_metrics = Some(metrics);
        self.is_trained = true;
        Ok(summary)
    }

    fn predict(&self, frame: &DataFrame) -> PipelineResult<BTreeMap<NaiveDateTime, f64>> {
        if frame.height() == 0 {
            return Err(PipelineError::TestSize { rows: 0 });
        }
        let network = match (&self.network, self.is_trained) {
            (Some(network), true) => network,
            _ => {
                return Err(PipelineError::NotTrained(
                    "no fitted scaler or weights available, train the model first".to_string(),
                ))
            }
        };
        if self.config.normalize && self.input_scaler.is_none() {
            warn!("normalized model has no input scaler");
            return Err(PipelineError::NotTrained("input scaler was never fitted".to_string()));
        }

        let features = feature_matrix(frame, &self.config.features)?;
        let values = infer(
            network,
            self.input_scaler.as_ref(),
            self.target_scaler.as_ref(),
            self.config.bounds,
            features,
        )?;
        Ok(timestamps(frame)?.into_iter().zip(values).collect())
    }

    fn save(&self, dir: &Path) -> PipelineResult<PathBuf> {
        let persist = |what: &str, e: &dyn std::fmt::Display| {
            PipelineError::Persistence(format!("{what} {}: {e}", dir.display()))
        };

        fs::create_dir_all(dir).map_err(|e| persist("cannot create", &e))?;
        let path = Self::artifact_path(dir);
        let bytes = bincode::serialize(&ArtifactRef {
            version: ARTIFACT_VERSION,
            model: self,
        })
        .map_err(|e| persist("cannot encode model for", &e))?;

        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, bytes).map_err(|e| persist("cannot write into", &e))?;
        fs::rename(&tmp, &path).map_err(|e| persist("cannot replace artifact in", &e))?;

        info!(path = %path.display(), trained = self.is_trained, "model saved");
        Ok(path)
    }

    fn last_split(&self) -> Option<&SplitSnapshot> {
        self.last_split.as_ref()
    }

    fn last_metrics(&self) -> Option<&ValidationMetrics> {
        self.last_metrics.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::config::NeuralNetworkParams;
    use crate::domain::{datetime_series, TIMESTAMP_COL};
    use chrono::{Duration, NaiveDate};
    use ndarray::array;
    use polars::prelude::{NamedFrom, Series};

    fn config(lower: f64, upper: f64) -> ModelConfig {
        let mut cfg = ModelConfig::defaults(ModelFamily::NeuralNetwork, OutputBounds { lower, upper });
        cfg.val_size = 5;
        cfg.features = vec!["x".to_string()];
        cfg.network = NeuralNetworkParams {
            epochs: 40,
            batch_size: 8,
            learning_rate: 0.01,
            dropout_rate: 0.0,
            hidden_layers: vec![8],
        };
        cfg
    }

    fn frame(rows: usize, target: impl Fn(f64) -> f64) -> DataFrame {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let stamps: Vec<_> = (0..rows).map(|i| start + Duration::hours(i as i64)).collect();
        let x: Vec<f64> = (0..rows).map(|i| (i % 10) as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| target(v)).collect();
        DataFrame::new(vec![
            datetime_series(TIMESTAMP_COL, &stamps).unwrap(),
            Series::new("x", x),
            Series::new("solar_power", y),
        ])
        .unwrap()
    }

    fn features_only(frame: &DataFrame) -> DataFrame {
        frame.select([TIMESTAMP_COL, "x"]).unwrap()
    }

    #[test]
    fn test_fit_needs_val_size_plus_one_rows() {
        let mut model = NeuralNetworkModel::new(config(0.0, 40.0));
        let result = model.fit(&frame(5, |x| x));
        assert!(matches!(result, Err(PipelineError::TrainSize { rows: 5, required: 6 })));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_predict_empty_frame_is_test_size_error() {
        let model = NeuralNetworkModel::new(config(0.0, 40.0));
        let result = model.predict(&features_only(&frame(0, |x| x)));
        assert!(matches!(result, Err(PipelineError::TestSize { rows: 0 })));
    }

    #[test]
    fn test_predict_untrained_is_not_trained_error() {
        let model = NeuralNetworkModel::new(config(0.0, 40.0));
        let result = model.predict(&features_only(&frame(3, |x| x)));
        assert!(matches!(result, Err(PipelineError::NotTrained(_))));
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut model = NeuralNetworkModel::new(config(0.0, 40.0));
        let summary = model.fit(&frame(80, |x| 2.0 + 0.5 * x)).unwrap();

        assert!(model.is_trained());
        assert_eq!(summary.epochs.len(), 40);
        assert_eq!(summary.validation_rows, 5);
        assert_eq!(summary.train_rows, 80);
        let first = summary.epochs[0].train_loss;
        let last = summary.epochs[39].train_loss;
        assert!(last < first, "loss went from {first} to {last}");
        assert!(model.last_split().is_some());
        assert!(model.last_metrics().is_some());
    }

    #[test]
    fn test_deterministic_fits_match() {
        let data = frame(40, |x| 1.0 + x);
        let mut a = NeuralNetworkModel::new(config(0.0, 40.0));
        let mut b = NeuralNetworkModel::new(config(0.0, 40.0));
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();

        let input = features_only(&data);
        assert_eq!(a.predict(&input).unwrap(), b.predict(&input).unwrap());
    }

    #[test]
    fn test_predictions_clamped_to_upper_bound() {
        let mut model = NeuralNetworkModel::new(config(0.0, 40.0));
        model.fit(&frame(30, |_| 100.0)).unwrap();
        let predictions = model.predict(&features_only(&frame(10, |_| 0.0))).unwrap();
        assert!(predictions.values().all(|&v| v == 40.0));
    }

    #[test]
    fn test_predictions_clamped_to_lower_bound() {
        let mut model = NeuralNetworkModel::new(config(5.0, 40.0));
        model.fit(&frame(30, |_| 0.0)).unwrap();
        let predictions = model.predict(&features_only(&frame(10, |_| 0.0))).unwrap();
        assert!(predictions.values().all(|&v| v == 5.0));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data = frame(40, |x| 3.0 * x);
        let mut model = NeuralNetworkModel::new(config(0.0, 40.0));
        model.fit(&data).unwrap();

        let path = model.save(dir.path()).unwrap();
        assert_eq!(path, NeuralNetworkModel::artifact_path(dir.path()));

        let restored = NeuralNetworkModel::load(dir.path()).unwrap();
        let input = features_only(&data);
        assert!(restored.is_trained());
        assert_eq!(restored.config(), model.config());
        assert_eq!(restored.last_split(), model.last_split());
        assert_eq!(restored.predict(&input).unwrap(), model.predict(&input).unwrap());
    }

    #[test]
    fn test_load_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NeuralNetworkModel::load(dir.path()),
            Err(PipelineError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_load_corrupt_artifact_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(NeuralNetworkModel::artifact_path(dir.path()), b"not a model").unwrap();
        assert!(matches!(
            NeuralNetworkModel::load(dir.path()),
            Err(PipelineError::Persistence(_))
        ));
    }

    #[test]
    fn test_loss_is_physical_error_over_capacity() {
        let y = array![[2.0], [6.0], [10.0], [14.0]];
        let scaler = StandardScaler::fit(&y).unwrap();
        let targets = scaler.transform(&y).unwrap().column(0).to_owned();
        let predictions = scaler.transform(&(&y + 3.0)).unwrap().column(0).to_owned();

        let loss = scaled_mae(&predictions, &targets, loss_scale(40.0, Some(&scaler)));
        assert!((loss - 3.0 / 40.0).abs() < 1e-12, "loss was {loss}");

        let unscaled = scaled_mae(&(&y.column(0) + 3.0), &y.column(0).to_owned(), loss_scale(40.0, None));
        assert!((unscaled - 3.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = NeuralNetworkModel::new(config(0.0, 40.0));
        model.config.network.dropout_rate = 1.0;
        model.save(dir.path()).unwrap();

        match NeuralNetworkModel::load(dir.path()) {
            Err(PipelineError::Persistence(message)) => {
                assert!(message.contains("invalid configuration"), "{message}")
            }
            other => panic!("expected a persistence error, got {other:?}"),
        }
    }
}
