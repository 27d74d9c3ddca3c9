//! Training helpers shared by model families: the chronological
//! train / validation split and validation metrics.

use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::ValidationMetrics;
use crate::domain::timestamps;
use crate::error::{PipelineError, PipelineResult};

/// Which hours the last `fit` trained and validated on, kept for
/// diagnostics and persisted with the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitSnapshot {
    pub train_index: Vec<NaiveDateTime>,
    pub validation_index: Vec<NaiveDateTime>,
}

/// Chronological train / validation frames.
#[derive(Debug, Clone)]
pub struct TrainValSplit {
    pub train: DataFrame,
    pub validation: DataFrame,
}

impl TrainValSplit {
    pub fn snapshot(&self) -> PipelineResult<SplitSnapshot> {
        Ok(SplitSnapshot {
            train_index: timestamps(&self.train)?,
            validation_index: timestamps(&self.validation)?,
        })
    }
}

/// Hold out the last `val_size` rows of a time-sorted frame. With
/// `separate_val_set` they are removed from the training part; otherwise
/// training keeps every row.
pub fn train_val_split(
    frame: &DataFrame,
    val_size: usize,
    separate_val_set: bool,
) -> PipelineResult<TrainValSplit> {
    let rows = frame.height();
    let required = val_size + 1;
    if rows < required {
        return Err(PipelineError::TrainSize { rows, required });
    }

    let pivot = rows - val_size;
    let validation = frame.slice(pivot as i64, val_size);
    let train = if separate_val_set {
        frame.slice(0, pivot)
    } else {
        frame.clone()
    };
    Ok(TrainValSplit { train, validation })
}

/// Index batches over `n` rows, optionally shuffled.
pub fn minibatches(n: usize, batch_size: usize, rng: &mut StdRng, shuffle: bool) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        order.shuffle(rng);
    }
    order
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// MAE, RMSE, MAPE (over non-zero targets, in percent) and R².
pub fn calculate_metrics(predictions: &[f64], targets: &[f64]) -> PipelineResult<ValidationMetrics> {
    if predictions.len() != targets.len() {
        return Err(PipelineError::ModelTraining(format!(
            "prediction and target count mismatch: {} vs {}",
            predictions.len(),
            targets.len()
        )));
    }
    if predictions.is_empty() {
        return Err(PipelineError::ModelTraining("no predictions to evaluate".to_string()));
    }

    let n = predictions.len() as f64;
    let pairs = || predictions.iter().zip(targets.iter());

    let mae = pairs().map(|(p, t)| (p - t).abs()).sum::<f64>() / n;
    let rmse = (pairs().map(|(p, t)| (p - t).powi(2)).sum::<f64>() / n).sqrt();

    // Zero output hours (dawn, dusk) would divide by zero.
    let (ape_sum, ape_n) = pairs()
        .filter(|(_, t)| t.abs() > 1e-10)
        .fold((0.0, 0usize), |(sum, count), (p, t)| {
            (sum + ((p - t) / t).abs() * 100.0, count + 1)
        });
    let mape = if ape_n == 0 { 0.0 } else { ape_sum / ape_n as f64 };

    let mean_target = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
    let ss_res: f64 = pairs().map(|(p, t)| (t - p).powi(2)).sum();
    let r2 = if ss_tot.abs() < 1e-10 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(ValidationMetrics::new(mae, rmse, mape, r2))
}
