//! Zero-mean / unit-variance feature scaling.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Per-column standardisation fitted on a training matrix. Columns with
/// zero variance keep a scale of 1 so they pass through centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> PipelineResult<Self> {
        let mean = data.mean_axis(Axis(0)).ok_or_else(|| {
            PipelineError::ModelTraining("cannot fit a scaler on zero rows".to_string())
        })?;
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    /// Per-column standard deviation, in the units of the fitted data.
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn check_width(&self, data: &Array2<f64>) -> PipelineResult<()> {
        if data.ncols() != self.n_features() {
            return Err(PipelineError::DataProcessing(format!(
                "scaler fitted on {} columns, got {}",
                self.n_features(),
                data.ncols()
            )));
        }
        Ok(())
    }

    pub fn transform(&self, data: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.check_width(data)?;
        Ok((data - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.check_width(data)?;
        Ok(data * &self.scale + &self.mean)
    }
}
