//! Router-level behaviour: status codes and response bodies.

#![cfg(feature = "ml")]

mod common;

use std::fs;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{hourly_samples, seoul_panel, site_today, test_config, test_state};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use solar_forecast::api::router;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(volume: &TempDir) -> Router {
    fs::create_dir_all(volume.path().join("models")).unwrap();
    fs::create_dir_all(volume.path().join("logs")).unwrap();
    router(test_state(test_config(volume.path(), 10, 2)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_healthcheck_reports_untrained_model() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let (status, body) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["is_healthy"], false);
    assert_eq!(body["details"]["model"]["details"], "Model not trained");
    assert_eq!(body["details"]["filesystem"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthcheck_flags_missing_log_dir() {
    let volume = TempDir::new().unwrap();
    fs::create_dir_all(volume.path().join("models")).unwrap();
    let app = router(test_state(test_config(volume.path(), 10, 2)));

    let (status, body) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["details"]["filesystem"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_predict_before_training_is_unavailable() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let panel = serde_json::to_value(seoul_panel(Some(1))).unwrap();
    let (status, body) = send(&app, Method::POST, "/predict", Some(panel)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "NotTrainedError");
}

#[tokio::test]
async fn test_predict_without_horizon_is_bad_request() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let panel = serde_json::to_value(seoul_panel(None)).unwrap();
    let (status, body) = send(&app, Method::POST, "/predict", Some(panel)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn test_predict_with_out_of_range_latitude_is_bad_request() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let mut panel = serde_json::to_value(seoul_panel(Some(1))).unwrap();
    panel["latitude"] = json!(123.0);
    let (status, _) = send(&app, Method::POST, "/predict", Some(panel)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_with_malformed_timestamp_is_bad_request() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let body = json!({
        "panel_metadata": seoul_panel(None),
        "panel_output": [{ "timestamp": "2024-06-15 12:00", "solar_power": 3.5 }],
    });
    let (status, body) = send(&app, Method::POST, "/train", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn test_train_with_too_few_samples_is_bad_request() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let samples = hourly_samples(site_today(), 1);
    let body = json!({
        "panel_metadata": seoul_panel(None),
        "panel_output": &samples[..5],
    });
    let (status, _) = send(&app, Method::POST, "/train", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_then_healthy_and_predicting() {
    let volume = TempDir::new().unwrap();
    let app = app(&volume);

    let body = json!({
        "panel_metadata": seoul_panel(None),
        "panel_output": hourly_samples(site_today(), 30),
    });
    let (status, body) = send(&app, Method::POST, "/train", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK", "status_code": 200 }));

    let (status, body) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["model"]["details"], "Model loaded and trained");

    let panel = serde_json::to_value(seoul_panel(Some(2))).unwrap();
    let (status, body) = send(&app, Method::POST, "/predict", Some(panel)).await;
    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_object().unwrap();
    assert!(!prediction.is_empty());
    assert!(prediction
        .values()
        .all(|v| (0.0..=40.0).contains(&v.as_f64().unwrap())));
}
