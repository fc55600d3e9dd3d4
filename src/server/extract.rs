use axum::extract::FromRequest;

use crate::core::errors::ApiError;

/// `axum::Json` whose rejections render as `422 {"detail": ...}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
