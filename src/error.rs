//! Typed errors raised by the preprocessing and model layers.
//!
//! The HTTP boundary (`api::error`) decides which of these are client errors
//! and which are server errors; nothing below it retries except the weather
//! client's transport middleware.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or insufficient caller input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Failure during fetch, clean or merge
    #[error("Data processing error: {0}")]
    DataProcessing(String),

    #[error("Training set too small: {rows} rows, need at least {required}")]
    TrainSize { rows: usize, required: usize },

    #[error("Inference set too small: {rows} rows, need at least 1")]
    TestSize { rows: usize },

    #[error("Model is not trained: {0}")]
    NotTrained(String),

    #[error("Model training failed: {0}")]
    ModelTraining(String),

    #[error("No persisted model at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Model persistence error: {0}")]
    Persistence(String),

    #[error("Unknown model family: {0}")]
    UnknownModelFamily(String),
}

impl PipelineError {
    /// Errors usually caused by bad input dates, coordinates or payloads.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::InvalidRange { .. }
                | PipelineError::DataProcessing(_)
                | PipelineError::TrainSize { .. }
                | PipelineError::TestSize { .. }
        )
    }

    /// Short machine-readable name, used as the `error` field of HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::InvalidRange { .. } => "InvalidRangeError",
            PipelineError::DataProcessing(_) => "DataProcessingError",
            PipelineError::TrainSize { .. } => "TrainSizeError",
            PipelineError::TestSize { .. } => "TestSizeError",
            PipelineError::NotTrained(_) => "NotTrainedError",
            PipelineError::ModelTraining(_) => "ModelTrainingError",
            PipelineError::ModelNotFound(_) => "ModelNotFoundError",
            PipelineError::Persistence(_) => "PersistenceError",
            PipelineError::UnknownModelFamily(_) => "UnknownModelFamilyError",
        }
    }
}

impl From<validator::ValidationErrors> for PipelineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        PipelineError::Validation(errors.to_string())
    }
}

#[cfg(feature = "ml")]
impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(error: polars::prelude::PolarsError) -> Self {
        PipelineError::DataProcessing(error.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
