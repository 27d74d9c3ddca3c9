pub mod error;
pub mod extract;
pub mod health;
pub mod predict;
pub mod train;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::service::AppState;

pub fn router(state: AppState) -> Router {
    let server = state.cfg.server.clone();

    Router::new()
        .route("/healthcheck", get(health::healthcheck))
        .route("/train", post(train::train))
        .route("/predict", post(predict::predict))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(server.body_limit_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
