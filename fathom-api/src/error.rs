//! Error Types for the FATHOM API
//!
//! The persistence layer raises typed errors, handlers map them to domain
//! `ErrorKind`s, and this module maps kinds to HTTP status codes and the
//! `{"error":{"kind":...,"message":...}}` response body. Stack traces never
//! leave the process; 5xx responses are logged with the request correlation
//! id by the request-id middleware.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use fathom_core::{ErrorKind, ParseEnumError};

/// Result alias used across handlers and the database client.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// API ERROR
// ============================================================================

/// Structured error carried from any layer up to the HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, message)
    }

    pub fn unknown_device(mid: &str) -> Self {
        Self::new(ErrorKind::UnknownDevice, format!("device {mid} not found"))
    }

    pub fn unknown_command(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownCommand, detail)
    }

    pub fn bad_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadState, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// HTTP status for this error's kind.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidPayload => StatusCode::BAD_REQUEST,
            ErrorKind::UnknownDevice | ErrorKind::UnknownCommand => StatusCode::NOT_FOUND,
            ErrorKind::BadState
            | ErrorKind::PlanMismatch
            | ErrorKind::Stale
            | ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// RESPONSE BODY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM LOWER LAYERS
// ============================================================================

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!(error = %err, "database error");
        Self::unavailable("database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!(error = %err, "connection pool error");
        Self::unavailable("database connection unavailable")
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(err: ParseEnumError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization failure: {err}"))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_status_codes() {
        let cases = [
            (ErrorKind::InvalidPayload, StatusCode::BAD_REQUEST),
            (ErrorKind::UnknownDevice, StatusCode::NOT_FOUND),
            (ErrorKind::UnknownCommand, StatusCode::NOT_FOUND),
            (ErrorKind::Conflict, StatusCode::CONFLICT),
            (ErrorKind::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            assert_eq!(ApiError::new(kind, "x").status_code(), status);
        }
    }

    #[test]
    fn body_serializes_with_screaming_kind() {
        let err = ApiError::conflict("command already in flight");
        let body = ErrorBody {
            error: ErrorDetail {
                kind: err.kind,
                message: err.message,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["kind"], "CONFLICT");
        assert_eq!(json["error"]["message"], "command already in flight");
    }
}
