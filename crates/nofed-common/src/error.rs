//! Centralized HTTP-facing error type for nofed.
//!
//! Lower crates keep their own `thiserror` enums and convert into
//! [`NofedError`] at the API boundary, where it renders as a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error returned by every route handler.
#[derive(Debug, thiserror::Error)]
pub enum NofedError {
    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    // === Input errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Malformed activity: {0}")]
    MalformedActivity(#[from] serde_json::Error),

    // === Infrastructure errors ===
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl NofedError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::MalformedActivity(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::MalformedActivity(_) => "MALFORMED_ACTIVITY",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for NofedError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            NofedError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                "An internal error occurred".to_string()
            }
            NofedError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using NofedError.
pub type NofedResult<T> = Result<T, NofedError>;
