use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{error::ApiError, extract::ApiJson};
use crate::domain::TrainingInput;
use crate::service::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub status: String,
    pub status_code: u16,
}

impl TrainResponse {
    fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            status_code: 200,
        }
    }
}

/// POST /train
pub async fn train(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<TrainingInput>,
) -> Result<Json<TrainResponse>, ApiError> {
    state.train(input).await?;
    Ok(Json(TrainResponse::ok()))
}
