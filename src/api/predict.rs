use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{error::ApiError, extract::ApiJson};
use crate::domain::PanelMetadata;
use crate::service::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Forecast per hour, keyed `YYYY-MM-DDTHH:MM:SS` in site local time.
    pub prediction: BTreeMap<String, f64>,
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    ApiJson(metadata): ApiJson<PanelMetadata>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let prediction = state.predict(metadata).await?;
    Ok(Json(PredictionResponse { prediction }))
}
