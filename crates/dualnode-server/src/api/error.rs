//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers with
//! automatic conversion to the JSON error shape the viewers and the
//! provisioning client expect: a machine-readable `error` code from the
//! coordinator taxonomy plus a human-readable `message` naming the
//! failing step.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dualnode_core::CoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error: an HTTP status plus the JSON error body.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "STATION_NOT_FOUND",
    "message": "Station not found: 'A1B2C3'",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. `CAPACITY_ERROR`).
    #[schema(example = "STATION_NOT_FOUND")]
    pub error: String,

    /// Human-readable error message naming the failing step.
    #[schema(example = "Station not found: 'A1B2C3'")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Build an error from a status, code, and message.
    #[must_use]
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// 400 with `MISSING_PARAMS` for an absent or empty request field.
    #[must_use]
    pub fn missing_params(field: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "MISSING_PARAMS",
            format!("Missing required parameter: {field}"),
        )
    }

    /// Attach debugging details to the response body.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.body.details = Some(details);
        self
    }

    /// The error code carried in the body.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.body.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                error_code = %self.body.error,
                message = %self.body.message,
                "request failed"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.body.error, self.body.message)
    }
}

impl std::error::Error for ApiError {}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err = ApiError::from(CoreError::StationNotFound("A1B2C3".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "STATION_NOT_FOUND");

        let err = ApiError::from(CoreError::CapacityExceeded { max: 2 });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "CAPACITY_ERROR");

        let err = ApiError::from(CoreError::Ai("overloaded".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "AI_ERROR");
    }

    #[test]
    fn test_missing_params_names_the_field() {
        let err = ApiError::missing_params("prompt");
        assert_eq!(err.code(), "MISSING_PARAMS");
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "INVALID_TYPE".to_string(),
            message: "Invalid station type".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("INVALID_TYPE"));
    }
}
