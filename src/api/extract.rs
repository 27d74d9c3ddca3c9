use axum::extract::FromRequest;

use super::error::ApiError;

/// `axum::Json` whose rejections (bad syntax, wrong shape, malformed
/// timestamps) surface as `ApiError::BadRequest`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
