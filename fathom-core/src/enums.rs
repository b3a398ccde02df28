//! Enum types for FATHOM entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

// ============================================================================
// COMMAND LIFECYCLE
// ============================================================================

/// Lifecycle states for operator-issued commands.
///
/// ```text
/// QUEUED ---(heartbeat poll)----> ISSUED
/// ISSUED ---(descent ok)--------> EXECUTING
/// ISSUED ---(descent fail)------> CANCELED
/// EXECUTING ---(ascent ok)------> COMPLETED
/// EXECUTING ---(ascent fail)----> ERROR
/// QUEUED ---(background sweep)--> EXPIRED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Queued,
    Issued,
    Executing,
    Completed,
    Canceled,
    Error,
    Expired,
}

impl CommandStatus {
    /// Whether a command in this status still occupies the per-device
    /// in-flight slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Queued | Self::Issued | Self::Executing)
    }

    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Error | Self::Expired
        )
    }

    /// Whether the lifecycle state machine permits `self -> next`.
    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Issued)
                | (Self::Queued, Self::Expired)
                | (Self::Issued, Self::Executing)
                | (Self::Issued, Self::Canceled)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Issued => "ISSUED",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Error => "ERROR",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "ISSUED" => Ok(Self::Issued),
            "EXECUTING" => Ok(Self::Executing),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELED" => Ok(Self::Canceled),
            "ERROR" => Ok(Self::Error),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(ParseEnumError::new("CommandStatus", other)),
        }
    }
}

// ============================================================================
// EVENT LOG TYPES
// ============================================================================

/// Event type tags written to the diagnostic event log.
pub mod event_type {
    pub const HB: &str = "HB";
    pub const DESCENT_CHECK: &str = "DESCENT_CHECK";
    pub const ASCENT_NOTIFY: &str = "ASCENT_NOTIFY";
    pub const CMD_ENQUEUED: &str = "CMD_ENQUEUED";
    pub const CMD_EXPIRED: &str = "CMD_EXPIRED";
    pub const CMD_ORPHAN_DIVE: &str = "CMD_ORPHAN_DIVE";
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_permits_only_defined_edges() {
        use CommandStatus::*;
        let all = [Queued, Issued, Executing, Completed, Canceled, Error, Expired];
        let legal = [
            (Queued, Issued),
            (Queued, Expired),
            (Issued, Executing),
            (Issued, Canceled),
            (Executing, Completed),
            (Executing, Error),
        ];
        for from in all {
            for to in all {
                let expected = legal.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states_are_not_in_flight() {
        use CommandStatus::*;
        for status in [Completed, Canceled, Error, Expired] {
            assert!(status.is_terminal());
            assert!(!status.is_in_flight());
        }
        for status in [Queued, Issued, Executing] {
            assert!(!status.is_terminal());
            assert!(status.is_in_flight());
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        use CommandStatus::*;
        for status in [Queued, Issued, Executing, Completed, Canceled, Error, Expired] {
            assert_eq!(status.as_str().parse::<CommandStatus>().unwrap(), status);
        }
        assert!("DIVING".parse::<CommandStatus>().is_err());
    }
}
