//! Vehicle wire protocol schemas
//!
//! The vehicle payload schema is evolving, so only the fields the core
//! inspects are typed; everything else rides along in the opaque stored
//! payload. Requests deserialize from the raw JSON body the handler also
//! persists, which keeps the audit trail byte-faithful.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// NESTED TELEMETRY GROUPS
// ============================================================================

/// GPS fix reported by the vehicle. `(0.0, 0.0)` is the no-fix sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsat: Option<i32>,
}

impl Position {
    /// Whether this fix is usable for trajectory rendering.
    pub fn is_valid(&self) -> bool {
        !(self.lat == 0.0 && self.lon == 0.0)
    }
}

/// Water column measurements. Extra fields are tolerated and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_temp_c: Option<f64>,
}

// ============================================================================
// HEARTBEAT
// ============================================================================

/// The typed slice of a heartbeat body. `power` and `network` are opaque to
/// the server and only surface in the stored payload and the rollup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeartbeatRequest {
    pub mid: String,
    #[serde(default)]
    pub fw: Option<String>,
    pub hb_seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub state: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub network: Option<Value>,
}

/// Envelope for a dispensed command, echoed verbatim on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub seq: u64,
    pub cmd: String,
    pub args: Value,
    pub plan_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ack: bool,
    pub command: Option<CommandEnvelope>,
}

// ============================================================================
// DESCENT CHECK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DescentCheckRequest {
    pub mid: String,
    #[serde(default)]
    pub fw: Option<String>,
    #[serde(default)]
    pub ts_utc: Option<DateTime<Utc>>,
    pub check_seq: u64,
    pub cmd_seq: u64,
    pub plan_hash: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub network: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescentCheckResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// ASCENT NOTIFY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AscentNotifyRequest {
    pub mid: String,
    #[serde(default)]
    pub fw: Option<String>,
    #[serde(default)]
    pub ts_utc: Option<DateTime<Utc>>,
    pub cmd_seq: u64,
    pub ok: bool,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub network: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AscentNotifyResponse {
    pub ack: bool,
}

// ============================================================================
// TESTS
// ============================================================================
