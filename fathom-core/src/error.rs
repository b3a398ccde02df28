//! Error kinds for FATHOM operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// DOMAIN ERROR KINDS
// ============================================================================

/// Error kinds surfaced to clients.
///
/// The persistence layer raises typed errors, the component layer maps them
/// to one of these kinds, and the HTTP layer maps kinds to status codes.
/// The same kinds double as the descent gate's rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Wire schema violation
    InvalidPayload,
    /// No such device
    UnknownDevice,
    /// No such command
    UnknownCommand,
    /// Command not in the status the operation requires
    BadState,
    /// Vehicle-computed plan hash differs from the stored one
    PlanMismatch,
    /// Command issuance is older than the freshness window
    Stale,
    /// Concurrent in-flight command for the same device
    Conflict,
    /// Database unavailable
    Unavailable,
    /// Unexpected server failure
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::UnknownDevice => "UNKNOWN_DEVICE",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::BadState => "BAD_STATE",
            Self::PlanMismatch => "PLAN_MISMATCH",
            Self::Stale => "STALE",
            Self::Conflict => "CONFLICT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// Failure to parse a persisted enum discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {type_name} value: {value}")]
pub struct ParseEnumError {
    pub type_name: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(type_name: &'static str, value: &str) -> Self {
        Self {
            type_name,
            value: value.to_string(),
        }
    }
}
