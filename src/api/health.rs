use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::service::AppState;

/// GET /healthcheck
///
/// 200 with the report when every check passes, 503 with the same body
/// otherwise.
pub async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    let report = tokio::task::spawn_blocking(move || state.healthcheck()).await;
    match report {
        Ok(report) => {
            let status = if report.is_healthy {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(report)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "health check task failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
