//! Error handling for the Netsite server API
//!
//! Every failure is returned as
//! `{ "error": msg, "errorDetails": { "errorCode", "errorMessage", "retryable" } }`.

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use netsite_core::CoreError;
use serde_json::json;

/// API error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Forbidden (403)
    Forbidden(String),
    /// Not found (404)
    NotFound(String),
    /// Internal server error (500)
    InternalServerError(String),
    /// Service unavailable (503); the request may be retried unchanged
    ServiceUnavailable(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => ApiError::BadRequest(msg),
            CoreError::SerializationError(msg) => ApiError::BadRequest(msg),
            CoreError::Forbidden(msg) => ApiError::Forbidden(msg),
            CoreError::SiteNotFound(site) => ApiError::NotFound(format!("Site {}", site)),
            CoreError::StateStoreError(msg) => ApiError::ServiceUnavailable(msg),
            CoreError::Other(msg) => ApiError::InternalServerError(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_VALIDATION_ERROR", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "ERR_FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", msg),
            ApiError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL_SERVER_ERROR", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ERR_STATE_STORE_UNAVAILABLE", msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error_code, "{}", message);
        } else {
            tracing::debug!(status = %status, error_code, "{}", message);
        }

        let body = Json(json!({
            "error": message,
            "errorDetails": {
                "errorCode": error_code,
                "errorMessage": message,
                "retryable": matches!(self, ApiError::ServiceUnavailable(_)),
            }
        }));

        (status, body).into_response()
    }
}
