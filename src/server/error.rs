//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`framefusion_core::Error`] via a wrapper
//! so route handlers can return `Result<T, AppError>` directly. The JSON
//! body is `{error, details?}`; `details` carries the engine diagnostic and
//! is only present for engine failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(framefusion_core::Error);

impl From<framefusion_core::Error> for AppError {
    fn from(e: framefusion_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
        }

        let body = match &self.0 {
            framefusion_core::Error::Tool { message, .. } => json!({
                "error": "Error processing video",
                "details": message,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
