//! Core entity structures
//!
//! These mirror the persisted schema one-to-one. Semi-structured columns
//! (`payload`, `args`, `summary`, the device snapshots) stay as
//! `serde_json::Value` so the wire format can evolve without migrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CommandStatus;

/// One row per physical vehicle; latest-value rollup owned exclusively by
/// the heartbeat ingest path. No other component writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub mid: String,
    pub fw: String,
    pub last_state: String,
    pub last_hb_seq: Option<i64>,
    pub last_seen_at: DateTime<Utc>,
    pub last_pos: Option<Value>,
    pub last_pwr: Option<Value>,
    pub last_env: Option<Value>,
    pub last_net: Option<Value>,
}

/// Append-only telemetry log entry, unique per `(mid, hb_seq)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: i64,
    pub mid: String,
    pub hb_seq: i64,
    pub ts_utc: DateTime<Utc>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Operator-issued instruction targeted at a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: i64,
    pub mid: String,
    /// Per-device monotone sequence, allocated at enqueue.
    pub seq: i64,
    pub cmd: String,
    pub args: Value,
    /// Canonical SHA-256 digest over `(cmd, args)`, lowercase hex.
    pub plan_hash: String,
    pub status: CommandStatus,
    pub issued_by: Option<String>,
    /// Heartbeat sequence at which this command was dispensed; carries the
    /// idempotent re-dispensation for retransmitted heartbeats.
    pub issued_hb_seq: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub executing_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Record of one pre-dive validation, unique per `(mid, check_seq)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescentCheck {
    pub id: i64,
    pub mid: String,
    pub check_seq: i64,
    pub cmd_seq: i64,
    pub plan_hash: String,
    pub ok: bool,
    pub reason: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Summary of one completed (or aborted) dive attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dive {
    pub id: i64,
    pub mid: String,
    pub cmd_seq: i64,
    pub ok: Option<bool>,
    pub summary: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only diagnostic trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: i64,
    pub mid: Option<String>,
    pub event_type: String,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}
