//! Response types for the billing API.
//!
//! This module defines the error response structures and the mapping from
//! engine errors onto HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Whether the caller may refetch and retry.
    #[serde(default)]
    pub retryable: bool,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code, message)
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates the error for a request without a tenant header.
    pub fn missing_organization(header: &str) -> Self {
        Self::with_details(
            "MISSING_ORGANIZATION",
            format!("missing header: {}", header),
            "Every request must name the organization it acts for",
        )
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response carrying `error`.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let retryable = error.is_retryable();
        let message = error.to_string();
        let (status, mut api_error) = match error {
            EngineError::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                ApiError::with_details(
                    "VALIDATION_ERROR",
                    message,
                    format!("The field '{}' was rejected", field),
                ),
            ),
            EngineError::Conflict { .. } => {
                (StatusCode::CONFLICT, ApiError::new("CONFLICT", message))
            }
            EngineError::NotFound { entity, .. } => (
                StatusCode::NOT_FOUND,
                ApiError::with_details("NOT_FOUND", message, format!("Unknown {}", entity)),
            ),
            EngineError::Configuration { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::with_details(
                    "BILLING_CONFIGURATION_ERROR",
                    message,
                    "No rate schedule or custom rate applies to this enrollment",
                ),
            ),
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details("CONFIG_ERROR", "Configuration error", message),
            ),
            EngineError::Aggregation { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("AGGREGATION_ERROR", message),
            ),
            EngineError::Storage { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("STORAGE_ERROR", message),
            ),
        };
        api_error.retryable = retryable;
        ApiErrorResponse {
            status,
            error: api_error,
        }
    }
}
