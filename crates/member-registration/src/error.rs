//! Error types for the registration service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registry_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Registration error types.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("An application was already submitted with this identifier")]
    Duplicate,

    #[error("Identifier not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    /// Wire status string and HTTP status for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            RegistrationError::Validation(_) => (StatusCode::BAD_REQUEST, "bad-request"),
            RegistrationError::Duplicate => (StatusCode::CONFLICT, "conflict"),
            RegistrationError::NotFound(_) => (StatusCode::NOT_FOUND, "not-found"),
            RegistrationError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal-error")
            }
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();

        // Storage details stay in the logs.
        let message = match &self {
            RegistrationError::Internal(detail) => {
                error!(detail = %detail, "Request failed with internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            status: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        RegistrationError::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RegistrationError {
    fn from(e: tokio::task::JoinError) -> Self {
        RegistrationError::Internal(format!("Store task failed: {}", e))
    }
}
