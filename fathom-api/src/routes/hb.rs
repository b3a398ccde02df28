//! Heartbeat ingest and command dispatch
//!
//! `POST /v1/hb` is the whole vehicle session: one request both delivers a
//! telemetry frame and pulls the next actionable command. Everything
//! happens inside a single transaction so the heartbeat row, the rollup,
//! and the command claim land together or not at all.
//!
//! Retransmits are expected wire behavior (the firmware duplicates sends on
//! poor cellular links): a previously seen `(mid, hb_seq)` re-returns the
//! command dispensed for it rather than draining the queue further.

use axum::{extract::State, Json};
use chrono::Utc;

use fathom_core::{
    event_type, Command, CommandEnvelope, HeartbeatRequest, HeartbeatResponse,
};

use crate::db;
use crate::error::ApiResult;
use crate::extractors::StrictJson;
use crate::routes::{seq_to_i64, snapshot_from, with_vehicle_deadline};
use crate::state::AppState;

pub async fn post_heartbeat(
    State(state): State<AppState>,
    body: StrictJson<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let req = body.parsed;
    let raw = body.raw;
    let hb_seq = seq_to_i64(req.hb_seq, "hb_seq")?;

    let command = with_vehicle_deadline(async {
        let mut conn = state.db.conn().await?;
        let tx = conn.transaction().await?;
        let now = Utc::now();

        let fresh =
            db::heartbeat_insert_if_absent(&*tx, &req.mid, hb_seq, req.ts_utc, &raw, now).await?;

        // Late or duplicate frames cannot clobber a newer rollup; the
        // monotone guard inside the upsert discards them.
        db::device_upsert_heartbeat(
            &*tx,
            &req.mid,
            req.fw.as_deref().unwrap_or(""),
            &req.state,
            hb_seq,
            now,
            snapshot_from(&raw),
        )
        .await?;

        // Replay: hand back whatever this hb_seq dispensed the first time,
        // wherever its lifecycle has moved since. A replay that never
        // dispensed anything behaves as fresh.
        let mut command = if fresh {
            None
        } else {
            db::command_issued_at_or_after(&*tx, &req.mid, hb_seq).await?
        };
        if command.is_none() {
            command = dispense_command(&*tx, &req.mid, hb_seq, now).await?;
        }

        db::event_log_insert(
            &*tx,
            Some(&req.mid),
            event_type::HB,
            &serde_json::json!({
                "hb_seq": hb_seq,
                "state": req.state.as_str(),
                "fresh": fresh,
                "command_seq": command.as_ref().map(|c| c.seq),
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            mid = %req.mid,
            hb_seq,
            fresh,
            command_seq = command.as_ref().map(|c| c.seq),
            "hb_processed"
        );
        Ok(command)
    })
    .await?;

    Ok(Json(HeartbeatResponse {
        ack: true,
        command: command.map(envelope),
    }))
}

/// Claim the oldest QUEUED command for this device. Losing the guarded
/// transition to a concurrent worker is retried once with the next
/// candidate; past that the slot stays empty until the next heartbeat.
async fn dispense_command(
    tx: &tokio_postgres::Transaction<'_>,
    mid: &str,
    hb_seq: i64,
    now: chrono::DateTime<Utc>,
) -> ApiResult<Option<Command>> {
    for _ in 0..2 {
        let Some(candidate) = db::command_oldest_queued(tx, mid).await? else {
            return Ok(None);
        };
        if db::command_claim_issued(tx, candidate.id, hb_seq, now).await? == 1 {
            return db::command_by_id(tx, candidate.id).await;
        }
    }
    Ok(None)
}

fn envelope(command: Command) -> CommandEnvelope {
    CommandEnvelope {
        seq: command.seq.max(0) as u64,
        cmd: command.cmd,
        args: command.args,
        plan_hash: command.plan_hash,
    }
}
