//! Request/response types for the gateway API

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;

/// API error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Standard error codes
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

pub type ErrorResponse = (StatusCode, Json<ApiError>);

pub fn bad_request(message: impl Into<String>) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(error_codes::VALIDATION_ERROR, message)),
    )
}

pub fn not_found(message: impl Into<String>) -> ErrorResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(error_codes::NOT_FOUND, message)),
    )
}

/// Map a service error onto the HTTP surface.
pub fn service_error_response(err: &ServiceError) -> ErrorResponse {
    let (status, code) = match err {
        ServiceError::EmptyInput(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
        ServiceError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
        ServiceError::RequestFailed(_)
        | ServiceError::Upstream(_)
        | ServiceError::InvalidResponse(_)
        | ServiceError::DimensionMismatch { .. } => {
            (StatusCode::BAD_GATEWAY, error_codes::UPSTREAM_ERROR)
        }
        ServiceError::InvalidConfiguration(_) | ServiceError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
        }
    };
    (status, Json(ApiError::new(code, err.to_string())))
}

/// Response for both upload endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub chunks: usize,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Request for the retrieval-backed query endpoint
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub session_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}
