//! Database Access Module
//!
//! PostgreSQL connection pooling via deadpool-postgres plus the data-access
//! functions the handlers compose. There is no implicit session state:
//! handlers open a transaction, pass it down explicitly, and commit.
//!
//! Three primitives carry all mutation semantics:
//! - idempotent device rollup upsert, monotone in `last_hb_seq`
//! - insert-if-absent on natural keys (`ON CONFLICT DO NOTHING`)
//! - guarded command transitions (`UPDATE ... WHERE id=$1 AND status=$2`)
//!   whose affected-row count tells a losing racer to re-read

use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use serde_json::Value;
use tokio_postgres::{GenericClient, NoTls, Row};

use fathom_core::{
    Command, CommandStatus, DescentCheck, Device, Dive, EventLog, Heartbeat,
};

use crate::config::DbConfig;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Cursor, DeviceCursor};

// ============================================================================
// SCHEMA BOOTSTRAP
// ============================================================================

/// Applied at startup; production deployments run proper migrations and
/// these statements then no-op.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    mid           TEXT PRIMARY KEY,
    fw            TEXT NOT NULL DEFAULT '',
    last_state    TEXT NOT NULL,
    last_hb_seq   BIGINT,
    last_seen_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    last_pos      JSONB,
    last_pwr      JSONB,
    last_env      JSONB,
    last_net      JSONB
);

CREATE TABLE IF NOT EXISTS heartbeats (
    id           BIGSERIAL PRIMARY KEY,
    mid          TEXT NOT NULL,
    hb_seq       BIGINT NOT NULL,
    ts_utc       TIMESTAMPTZ NOT NULL,
    payload      JSONB NOT NULL,
    received_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_heartbeats_mid_seq UNIQUE (mid, hb_seq)
);
CREATE INDEX IF NOT EXISTS ix_heartbeats_mid_ts ON heartbeats (mid, ts_utc);

CREATE TABLE IF NOT EXISTS commands (
    id             BIGSERIAL PRIMARY KEY,
    mid            TEXT NOT NULL,
    seq            BIGINT NOT NULL,
    cmd            TEXT NOT NULL DEFAULT 'RUN_DIVE',
    args           JSONB NOT NULL,
    plan_hash      TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'QUEUED',
    issued_by      TEXT,
    issued_hb_seq  BIGINT,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    issued_at      TIMESTAMPTZ,
    executing_at   TIMESTAMPTZ,
    completed_at   TIMESTAMPTZ,
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_commands_mid_seq UNIQUE (mid, seq)
);
CREATE INDEX IF NOT EXISTS ix_commands_mid_status ON commands (mid, status);

CREATE TABLE IF NOT EXISTS descent_checks (
    id          BIGSERIAL PRIMARY KEY,
    mid         TEXT NOT NULL,
    check_seq   BIGINT NOT NULL,
    cmd_seq     BIGINT NOT NULL,
    plan_hash   TEXT NOT NULL,
    ok          BOOLEAN NOT NULL,
    reason      TEXT,
    payload     JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_descent_mid_seq UNIQUE (mid, check_seq)
);

CREATE TABLE IF NOT EXISTS dives (
    id          BIGSERIAL PRIMARY KEY,
    mid         TEXT NOT NULL,
    cmd_seq     BIGINT NOT NULL,
    ok          BOOLEAN,
    summary     JSONB,
    started_at  TIMESTAMPTZ,
    ended_at    TIMESTAMPTZ,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_dives_mid_created ON dives (mid, created_at);

CREATE TABLE IF NOT EXISTS event_logs (
    id          BIGSERIAL PRIMARY KEY,
    mid         TEXT,
    event_type  TEXT NOT NULL,
    detail      JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_event_logs_mid_created ON event_logs (mid, created_at);
"#;

// ============================================================================
// CLIENT
// ============================================================================

/// Pooled database client shared across handlers.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pg_config: tokio_postgres::Config = config
            .url
            .parse()
            .map_err(|e| ApiError::internal(format!("invalid DATABASE_URL: {e}")))?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| ApiError::internal(format!("failed to build pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub async fn conn(&self) -> ApiResult<Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Create the schema if it does not exist yet.
    pub async fn init_schema(&self) -> ApiResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        Ok(())
    }

    /// Trivial round-trip used by the health probe.
    pub async fn health_check(&self) -> ApiResult<bool> {
        let conn = self.conn().await?;
        let row = conn.query_one("SELECT 1", &[]).await?;
        Ok(row.get::<_, i32>(0) == 1)
    }

    /// Destroy all data. Development only; gated behind configuration.
    pub async fn reset_db(&self) -> ApiResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(
            "TRUNCATE event_logs, descent_checks, dives, commands, heartbeats, devices \
             RESTART IDENTITY",
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const COMMAND_COLS: &str =
    "id, mid, seq, cmd, args, plan_hash, status, issued_by, issued_hb_seq, \
     created_at, issued_at, executing_at, completed_at, updated_at";

fn command_from_row(row: &Row) -> ApiResult<Command> {
    let status: String = row.get("status");
    Ok(Command {
        id: row.get("id"),
        mid: row.get("mid"),
        seq: row.get("seq"),
        cmd: row.get("cmd"),
        args: row.get("args"),
        plan_hash: row.get("plan_hash"),
        status: status.parse::<CommandStatus>()?,
        issued_by: row.get("issued_by"),
        issued_hb_seq: row.get("issued_hb_seq"),
        created_at: row.get("created_at"),
        issued_at: row.get("issued_at"),
        executing_at: row.get("executing_at"),
        completed_at: row.get("completed_at"),
        updated_at: row.get("updated_at"),
    })
}

fn device_from_row(row: &Row) -> Device {
    Device {
        mid: row.get("mid"),
        fw: row.get("fw"),
        last_state: row.get("last_state"),
        last_hb_seq: row.get("last_hb_seq"),
        last_seen_at: row.get("last_seen_at"),
        last_pos: row.get("last_pos"),
        last_pwr: row.get("last_pwr"),
        last_env: row.get("last_env"),
        last_net: row.get("last_net"),
    }
}

fn heartbeat_from_row(row: &Row) -> Heartbeat {
    Heartbeat {
        id: row.get("id"),
        mid: row.get("mid"),
        hb_seq: row.get("hb_seq"),
        ts_utc: row.get("ts_utc"),
        payload: row.get("payload"),
        received_at: row.get("received_at"),
    }
}

fn descent_check_from_row(row: &Row) -> DescentCheck {
    DescentCheck {
        id: row.get("id"),
        mid: row.get("mid"),
        check_seq: row.get("check_seq"),
        cmd_seq: row.get("cmd_seq"),
        plan_hash: row.get("plan_hash"),
        ok: row.get("ok"),
        reason: row.get("reason"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
    }
}

fn dive_from_row(row: &Row) -> Dive {
    Dive {
        id: row.get("id"),
        mid: row.get("mid"),
        cmd_seq: row.get("cmd_seq"),
        ok: row.get("ok"),
        summary: row.get("summary"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        created_at: row.get("created_at"),
    }
}

fn event_log_from_row(row: &Row) -> EventLog {
    EventLog {
        id: row.get("id"),
        mid: row.get("mid"),
        event_type: row.get("event_type"),
        detail: row.get("detail"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// DEVICE ROLLUP
// ============================================================================

/// Snapshot values applied to the device rollup.
#[derive(Debug, Clone, Copy)]
pub struct RollupSnapshot<'a> {
    pub pos: Option<&'a Value>,
    pub pwr: Option<&'a Value>,
    pub env: Option<&'a Value>,
    pub net: Option<&'a Value>,
}

/// Heartbeat-path rollup upsert. The monotone guard keeps a late or
/// duplicate frame from clobbering a newer rollup.
pub async fn device_upsert_heartbeat(
    client: &(impl GenericClient + Sync),
    mid: &str,
    fw: &str,
    state: &str,
    hb_seq: i64,
    seen_at: DateTime<Utc>,
    snapshot: RollupSnapshot<'_>,
) -> ApiResult<()> {
    client
        .execute(
            "INSERT INTO devices \
                 (mid, fw, last_state, last_hb_seq, last_seen_at, \
                  last_pos, last_pwr, last_env, last_net) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (mid) DO UPDATE SET \
                 fw = EXCLUDED.fw, \
                 last_state = EXCLUDED.last_state, \
                 last_hb_seq = EXCLUDED.last_hb_seq, \
                 last_seen_at = EXCLUDED.last_seen_at, \
                 last_pos = EXCLUDED.last_pos, \
                 last_pwr = EXCLUDED.last_pwr, \
                 last_env = EXCLUDED.last_env, \
                 last_net = EXCLUDED.last_net \
             WHERE devices.last_hb_seq IS NULL \
                OR devices.last_hb_seq <= EXCLUDED.last_hb_seq",
            &[
                &mid,
                &fw,
                &state,
                &hb_seq,
                &seen_at,
                &snapshot.pos,
                &snapshot.pwr,
                &snapshot.env,
                &snapshot.net,
            ],
        )
        .await?;
    Ok(())
}

pub async fn device_get(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<Option<Device>> {
    let row = client
        .query_opt("SELECT * FROM devices WHERE mid = $1", &[&mid])
        .await?;
    Ok(row.as_ref().map(device_from_row))
}

/// Lock the device row for the rest of the transaction; serializes
/// concurrent enqueues for the same device.
pub async fn device_lock(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<bool> {
    let row = client
        .query_opt("SELECT mid FROM devices WHERE mid = $1 FOR UPDATE", &[&mid])
        .await?;
    Ok(row.is_some())
}

pub async fn devices_list(
    client: &(impl GenericClient + Sync),
    state: Option<&str>,
    cursor: Option<&DeviceCursor>,
    limit: i64,
) -> ApiResult<Vec<Device>> {
    let cursor_ts = cursor.map(|c| c.last_seen_at);
    let cursor_mid = cursor.map(|c| c.mid.as_str());
    let rows = client
        .query(
            "SELECT * FROM devices \
             WHERE ($1::text IS NULL OR last_state = $1) \
               AND ($2::timestamptz IS NULL OR (last_seen_at, mid) < ($2, $3)) \
             ORDER BY last_seen_at DESC, mid DESC \
             LIMIT $4",
            &[&state, &cursor_ts, &cursor_mid, &limit],
        )
        .await?;
    Ok(rows.iter().map(device_from_row).collect())
}

// ============================================================================
// HEARTBEATS
// ============================================================================

/// Insert-if-absent on `(mid, hb_seq)`. Returns whether the row was fresh;
/// a duplicate is expected wire behavior, not an error.
pub async fn heartbeat_insert_if_absent(
    client: &(impl GenericClient + Sync),
    mid: &str,
    hb_seq: i64,
    ts_utc: DateTime<Utc>,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> ApiResult<bool> {
    let affected = client
        .execute(
            "INSERT INTO heartbeats (mid, hb_seq, ts_utc, payload, received_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (mid, hb_seq) DO NOTHING",
            &[&mid, &hb_seq, &ts_utc, &payload, &received_at],
        )
        .await?;
    Ok(affected == 1)
}

pub async fn heartbeat_latest(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<Option<Heartbeat>> {
    let row = client
        .query_opt(
            "SELECT * FROM heartbeats WHERE mid = $1 ORDER BY hb_seq DESC LIMIT 1",
            &[&mid],
        )
        .await?;
    Ok(row.as_ref().map(heartbeat_from_row))
}

pub async fn heartbeats_list(
    client: &(impl GenericClient + Sync),
    mid: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    cursor: Option<&Cursor>,
    limit: i64,
) -> ApiResult<Vec<Heartbeat>> {
    let cursor_ts = cursor.map(|c| c.created_at);
    let cursor_id = cursor.map(|c| c.id);
    let rows = client
        .query(
            "SELECT * FROM heartbeats \
             WHERE mid = $1 \
               AND ($2::timestamptz IS NULL OR ts_utc >= $2) \
               AND ($3::timestamptz IS NULL OR ts_utc <= $3) \
               AND ($4::timestamptz IS NULL OR (received_at, id) < ($4, $5)) \
             ORDER BY received_at DESC, id DESC \
             LIMIT $6",
            &[&mid, &from, &to, &cursor_ts, &cursor_id, &limit],
        )
        .await?;
    Ok(rows.iter().map(heartbeat_from_row).collect())
}

/// Ascending frame stream feeding the trajectory builder.
pub async fn heartbeats_for_trajectory(
    client: &(impl GenericClient + Sync),
    mid: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> ApiResult<Vec<Heartbeat>> {
    let rows = client
        .query(
            "SELECT * FROM heartbeats \
             WHERE mid = $1 \
               AND ($2::timestamptz IS NULL OR ts_utc >= $2) \
               AND ($3::timestamptz IS NULL OR ts_utc <= $3) \
             ORDER BY hb_seq ASC",
            &[&mid, &from, &to],
        )
        .await?;
    Ok(rows.iter().map(heartbeat_from_row).collect())
}

// ============================================================================
// COMMANDS
// ============================================================================

pub async fn command_insert(
    client: &(impl GenericClient + Sync),
    mid: &str,
    seq: i64,
    cmd: &str,
    args: &Value,
    plan_hash: &str,
    issued_by: Option<&str>,
    now: DateTime<Utc>,
) -> ApiResult<Command> {
    let sql = format!(
        "INSERT INTO commands (mid, seq, cmd, args, plan_hash, status, issued_by, \
                               created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'QUEUED', $6, $7, $7) \
         RETURNING {COMMAND_COLS}"
    );
    let row = client
        .query_one(
            sql.as_str(),
            &[&mid, &seq, &cmd, &args, &plan_hash, &issued_by, &now],
        )
        .await?;
    command_from_row(&row)
}

pub async fn command_next_seq(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<i64> {
    let row = client
        .query_one(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM commands WHERE mid = $1",
            &[&mid],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn command_in_flight_exists(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<bool> {
    let row = client
        .query_opt(
            "SELECT 1 FROM commands \
             WHERE mid = $1 AND status IN ('QUEUED', 'ISSUED', 'EXECUTING') \
             LIMIT 1",
            &[&mid],
        )
        .await?;
    Ok(row.is_some())
}

pub async fn command_oldest_queued(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<Option<Command>> {
    let sql = format!(
        "SELECT {COMMAND_COLS} FROM commands \
         WHERE mid = $1 AND status = 'QUEUED' \
         ORDER BY seq ASC LIMIT 1"
    );
    let row = client.query_opt(sql.as_str(), &[&mid]).await?;
    row.as_ref().map(command_from_row).transpose()
}

/// The command a retransmitted heartbeat should re-receive: the oldest one
/// dispensed at or after that `hb_seq`, regardless of where its lifecycle
/// has moved since.
pub async fn command_issued_at_or_after(
    client: &(impl GenericClient + Sync),
    mid: &str,
    hb_seq: i64,
) -> ApiResult<Option<Command>> {
    let sql = format!(
        "SELECT {COMMAND_COLS} FROM commands \
         WHERE mid = $1 AND issued_hb_seq IS NOT NULL AND issued_hb_seq >= $2 \
         ORDER BY issued_hb_seq ASC, seq ASC LIMIT 1"
    );
    let row = client.query_opt(sql.as_str(), &[&mid, &hb_seq]).await?;
    row.as_ref().map(command_from_row).transpose()
}

pub async fn command_by_mid_seq(
    client: &(impl GenericClient + Sync),
    mid: &str,
    seq: i64,
) -> ApiResult<Option<Command>> {
    let sql = format!("SELECT {COMMAND_COLS} FROM commands WHERE mid = $1 AND seq = $2");
    let row = client.query_opt(sql.as_str(), &[&mid, &seq]).await?;
    row.as_ref().map(command_from_row).transpose()
}

pub async fn command_by_id(
    client: &(impl GenericClient + Sync),
    id: i64,
) -> ApiResult<Option<Command>> {
    let sql = format!("SELECT {COMMAND_COLS} FROM commands WHERE id = $1");
    let row = client.query_opt(sql.as_str(), &[&id]).await?;
    row.as_ref().map(command_from_row).transpose()
}

/// Guarded QUEUED -> ISSUED claim, stamping the dispensing heartbeat.
pub async fn command_claim_issued(
    client: &(impl GenericClient + Sync),
    id: i64,
    hb_seq: i64,
    now: DateTime<Utc>,
) -> ApiResult<u64> {
    let affected = client
        .execute(
            "UPDATE commands \
             SET status = 'ISSUED', issued_at = $2, issued_hb_seq = $3, updated_at = $2 \
             WHERE id = $1 AND status = 'QUEUED'",
            &[&id, &now, &hb_seq],
        )
        .await?;
    Ok(affected)
}

/// Guarded ISSUED -> EXECUTING.
pub async fn command_mark_executing(
    client: &(impl GenericClient + Sync),
    id: i64,
    now: DateTime<Utc>,
) -> ApiResult<u64> {
    let affected = client
        .execute(
            "UPDATE commands \
             SET status = 'EXECUTING', executing_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'ISSUED'",
            &[&id, &now],
        )
        .await?;
    Ok(affected)
}

/// Guarded ISSUED -> CANCELED after a failed descent check.
pub async fn command_cancel_issued(
    client: &(impl GenericClient + Sync),
    id: i64,
    now: DateTime<Utc>,
) -> ApiResult<u64> {
    let affected = client
        .execute(
            "UPDATE commands \
             SET status = 'CANCELED', completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'ISSUED'",
            &[&id, &now],
        )
        .await?;
    Ok(affected)
}

/// Guarded EXECUTING -> COMPLETED / ERROR at ascent.
pub async fn command_finish_executing(
    client: &(impl GenericClient + Sync),
    id: i64,
    ok: bool,
    now: DateTime<Utc>,
) -> ApiResult<u64> {
    let status = if ok {
        CommandStatus::Completed
    } else {
        CommandStatus::Error
    };
    let affected = client
        .execute(
            "UPDATE commands \
             SET status = $3, completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'EXECUTING'",
            &[&id, &now, &status.as_str()],
        )
        .await?;
    Ok(affected)
}

/// Sweep QUEUED commands older than the cutoff to EXPIRED. The status
/// predicate makes this safe to run concurrently with ingest.
pub async fn command_expire_batch(
    client: &(impl GenericClient + Sync),
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ApiResult<Vec<Command>> {
    let sql = format!(
        "UPDATE commands \
         SET status = 'EXPIRED', completed_at = $2, updated_at = $2 \
         WHERE status = 'QUEUED' AND created_at < $1 \
         RETURNING {COMMAND_COLS}"
    );
    let rows = client.query(sql.as_str(), &[&cutoff, &now]).await?;
    rows.iter().map(command_from_row).collect()
}

pub async fn commands_list(
    client: &(impl GenericClient + Sync),
    mid: Option<&str>,
    status: Option<CommandStatus>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    cursor: Option<&Cursor>,
    limit: i64,
) -> ApiResult<Vec<Command>> {
    let status = status.map(CommandStatus::as_str);
    let cursor_ts = cursor.map(|c| c.created_at);
    let cursor_id = cursor.map(|c| c.id);
    let sql = format!(
        "SELECT {COMMAND_COLS} FROM commands \
         WHERE ($1::text IS NULL OR mid = $1) \
           AND ($2::text IS NULL OR status = $2) \
           AND ($3::timestamptz IS NULL OR created_at >= $3) \
           AND ($4::timestamptz IS NULL OR created_at <= $4) \
           AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6)) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $7"
    );
    let rows = client
        .query(
            sql.as_str(),
            &[&mid, &status, &from, &to, &cursor_ts, &cursor_id, &limit],
        )
        .await?;
    rows.iter().map(command_from_row).collect()
}

// ============================================================================
// DESCENT CHECKS
// ============================================================================

pub async fn descent_check_get(
    client: &(impl GenericClient + Sync),
    mid: &str,
    check_seq: i64,
) -> ApiResult<Option<DescentCheck>> {
    let row = client
        .query_opt(
            "SELECT * FROM descent_checks WHERE mid = $1 AND check_seq = $2",
            &[&mid, &check_seq],
        )
        .await?;
    Ok(row.as_ref().map(descent_check_from_row))
}

#[allow(clippy::too_many_arguments)]
pub async fn descent_check_insert_if_absent(
    client: &(impl GenericClient + Sync),
    mid: &str,
    check_seq: i64,
    cmd_seq: i64,
    plan_hash: &str,
    ok: bool,
    reason: Option<&str>,
    payload: &Value,
    now: DateTime<Utc>,
) -> ApiResult<bool> {
    let affected = client
        .execute(
            "INSERT INTO descent_checks \
                 (mid, check_seq, cmd_seq, plan_hash, ok, reason, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (mid, check_seq) DO NOTHING",
            &[&mid, &check_seq, &cmd_seq, &plan_hash, &ok, &reason, &payload, &now],
        )
        .await?;
    Ok(affected == 1)
}

// ============================================================================
// DIVES
// ============================================================================

/// Record a dive outcome, updating in place when the vehicle re-reports the
/// same `(mid, cmd_seq)` over a flaky link.
#[allow(clippy::too_many_arguments)]
pub async fn dive_upsert(
    client: &(impl GenericClient + Sync),
    mid: &str,
    cmd_seq: i64,
    ok: bool,
    summary: Option<&Value>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ApiResult<Dive> {
    let updated = client
        .query_opt(
            "UPDATE dives \
             SET ok = $3, summary = $4, \
                 started_at = COALESCE($5, started_at), \
                 ended_at = COALESCE($6, ended_at) \
             WHERE mid = $1 AND cmd_seq = $2 \
             RETURNING *",
            &[&mid, &cmd_seq, &ok, &summary, &started_at, &ended_at],
        )
        .await?;
    if let Some(row) = updated {
        return Ok(dive_from_row(&row));
    }
    let row = client
        .query_one(
            "INSERT INTO dives (mid, cmd_seq, ok, summary, started_at, ended_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING *",
            &[&mid, &cmd_seq, &ok, &summary, &started_at, &ended_at, &now],
        )
        .await?;
    Ok(dive_from_row(&row))
}

pub async fn dive_by_id(
    client: &(impl GenericClient + Sync),
    id: i64,
) -> ApiResult<Option<Dive>> {
    let row = client
        .query_opt("SELECT * FROM dives WHERE id = $1", &[&id])
        .await?;
    Ok(row.as_ref().map(dive_from_row))
}

pub async fn dives_for_mid(
    client: &(impl GenericClient + Sync),
    mid: &str,
) -> ApiResult<Vec<Dive>> {
    let rows = client
        .query(
            "SELECT * FROM dives WHERE mid = $1 ORDER BY created_at ASC",
            &[&mid],
        )
        .await?;
    Ok(rows.iter().map(dive_from_row).collect())
}

pub async fn dives_list(
    client: &(impl GenericClient + Sync),
    mid: Option<&str>,
    ok: Option<bool>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    cursor: Option<&Cursor>,
    limit: i64,
) -> ApiResult<Vec<Dive>> {
    let cursor_ts = cursor.map(|c| c.created_at);
    let cursor_id = cursor.map(|c| c.id);
    let rows = client
        .query(
            "SELECT * FROM dives \
             WHERE ($1::text IS NULL OR mid = $1) \
               AND ($2::boolean IS NULL OR ok = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4) \
               AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $7",
            &[&mid, &ok, &from, &to, &cursor_ts, &cursor_id, &limit],
        )
        .await?;
    Ok(rows.iter().map(dive_from_row).collect())
}

// ============================================================================
// EVENT LOG
// ============================================================================

pub async fn event_log_insert(
    client: &(impl GenericClient + Sync),
    mid: Option<&str>,
    event_type: &str,
    detail: &Value,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    client
        .execute(
            "INSERT INTO event_logs (mid, event_type, detail, created_at) \
             VALUES ($1, $2, $3, $4)",
            &[&mid, &event_type, &detail, &now],
        )
        .await?;
    Ok(())
}

pub async fn events_list(
    client: &(impl GenericClient + Sync),
    mid: Option<&str>,
    event_type: Option<&str>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    cursor: Option<&Cursor>,
    limit: i64,
) -> ApiResult<Vec<EventLog>> {
    let cursor_ts = cursor.map(|c| c.created_at);
    let cursor_id = cursor.map(|c| c.id);
    let rows = client
        .query(
            "SELECT * FROM event_logs \
             WHERE ($1::text IS NULL OR mid = $1) \
               AND ($2::text IS NULL OR event_type = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4) \
               AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $7",
            &[&mid, &event_type, &from, &to, &cursor_ts, &cursor_id, &limit],
        )
        .await?;
    Ok(rows.iter().map(event_log_from_row).collect())
}
