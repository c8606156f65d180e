//! Error responses in the `{"detail": ...}` shape clients expect.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::error::{ChatError, ErrorKind};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Chat failures are the caller's problem unless the model was slow or
    /// broken.
    pub fn chat(err: &ChatError) -> Self {
        let status = match err.kind() {
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }

    pub fn profile(err: &ChatError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }

    #[cfg(test)]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// Malformed or mistyped request bodies keep axum's status but answer in
/// the same shape as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, detail = %self.detail, "Request failed");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
