//! Request/Response Types for the Web API
//!
//! Shapes returned to the operator UI. Telemetry snapshots stay as opaque
//! JSON; the UI renders whatever the vehicle sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fathom_core::{Command, CommandStatus, Device, Dive, EventLog, Heartbeat};

// ============================================================================
// DEVICES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceListItem {
    pub mid: String,
    pub fw: String,
    pub state: String,
    pub last_hb_seq: Option<i64>,
    pub last_seen_at: DateTime<Utc>,
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub mid: String,
    pub fw: String,
    pub state: String,
    pub last_hb_seq: Option<i64>,
    pub last_seen_at: DateTime<Utc>,
    pub position: Option<Value>,
    pub power: Option<Value>,
    pub environment: Option<Value>,
    pub network: Option<Value>,
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatusResponse {
    pub mid: String,
    pub state: String,
    pub online: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl DeviceListItem {
    pub fn from_device(device: &Device, online: bool) -> Self {
        Self {
            mid: device.mid.clone(),
            fw: device.fw.clone(),
            state: device.last_state.clone(),
            last_hb_seq: device.last_hb_seq,
            last_seen_at: device.last_seen_at,
            online,
        }
    }
}

impl DeviceDetail {
    pub fn from_device(device: Device, online: bool) -> Self {
        Self {
            mid: device.mid,
            fw: device.fw,
            state: device.last_state,
            last_hb_seq: device.last_hb_seq,
            last_seen_at: device.last_seen_at,
            position: device.last_pos,
            power: device.last_pwr,
            environment: device.last_env,
            network: device.last_net,
            online,
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueCommandRequest {
    pub mid: String,
    pub cmd: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command_id: i64,
    pub mid: String,
    pub seq: i64,
    pub cmd: String,
    pub args: Value,
    pub plan_hash: String,
    pub status: CommandStatus,
    pub issued_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Command> for CommandResponse {
    fn from(cmd: Command) -> Self {
        Self {
            command_id: cmd.id,
            mid: cmd.mid,
            seq: cmd.seq,
            cmd: cmd.cmd,
            args: cmd.args,
            plan_hash: cmd.plan_hash,
            status: cmd.status,
            issued_by: cmd.issued_by,
            created_at: cmd.created_at,
            issued_at: cmd.issued_at,
            completed_at: cmd.completed_at,
        }
    }
}

// ============================================================================
// TELEMETRY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatItem {
    pub hb_seq: i64,
    pub ts_utc: DateTime<Utc>,
    pub state: String,
    pub position: Option<Value>,
    pub power: Option<Value>,
    pub environment: Option<Value>,
    pub network: Option<Value>,
    pub received_at: DateTime<Utc>,
}

impl From<Heartbeat> for HeartbeatItem {
    fn from(hb: Heartbeat) -> Self {
        let group = |key: &str| {
            hb.payload
                .get(key)
                .filter(|v| !v.is_null())
                .cloned()
        };
        Self {
            hb_seq: hb.hb_seq,
            ts_utc: hb.ts_utc,
            state: hb
                .payload
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string(),
            position: group("position"),
            power: group("power"),
            environment: group("environment"),
            network: group("network"),
            received_at: hb.received_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestTelemetryResponse {
    pub mid: String,
    pub hb_seq: Option<i64>,
    pub ts_utc: DateTime<Utc>,
    pub state: String,
    pub position: Option<Value>,
    pub power: Option<Value>,
    pub environment: Option<Value>,
    pub network: Option<Value>,
}

// ============================================================================
// DIVES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiveItem {
    pub dive_id: i64,
    pub mid: String,
    pub cmd_seq: i64,
    pub ok: Option<bool>,
    pub summary: Option<Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Dive> for DiveItem {
    fn from(dive: Dive) -> Self {
        Self {
            dive_id: dive.id,
            mid: dive.mid,
            cmd_seq: dive.cmd_seq,
            ok: dive.ok,
            summary: dive.summary,
            started_at: dive.started_at,
            ended_at: dive.ended_at,
            created_at: dive.created_at,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventItem {
    pub event_id: i64,
    pub mid: Option<String>,
    pub event_type: String,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl From<EventLog> for EventItem {
    fn from(event: EventLog) -> Self {
        Self {
            event_id: event.id,
            mid: event.mid,
            event_type: event.event_type,
            detail: event.detail,
            created_at: event.created_at,
        }
    }
}

// ============================================================================
// SCAFFOLDING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub db: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleMessage {
    pub message: String,
}
