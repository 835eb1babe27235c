//! API Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the webhook endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Handshake token or mode did not match.
    #[error("Verification failed")]
    VerificationFailed,

    /// `X-Hub-Signature-256` header absent outside development.
    #[error("Missing signature")]
    MissingSignature,

    /// `X-Hub-Signature-256` did not match the body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Request body is not JSON.
    #[error("Invalid JSON")]
    InvalidJson,

    /// Request body could not be read.
    #[error("Invalid request body")]
    InvalidBody,
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    /// HTTP status and machine-readable code.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::VerificationFailed => (StatusCode::FORBIDDEN, "VERIFICATION_FAILED"),
            Self::MissingSignature => (StatusCode::UNAUTHORIZED, "MISSING_SIGNATURE"),
            Self::InvalidSignature => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
            Self::InvalidJson => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            Self::InvalidBody => (StatusCode::BAD_REQUEST, "INVALID_BODY"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
