//! Ascent reconciler
//!
//! `POST /v1/ascent-notify` closes out a dive attempt: record the Dive row
//! and move the command out of EXECUTING. A notify for a command that never
//! reached EXECUTING still records the dive, flagged `orphan`, so history
//! survives a lost descent-check.

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde_json::Value;

use fathom_core::{event_type, AscentNotifyRequest, AscentNotifyResponse, CommandStatus};

use crate::db;
use crate::error::ApiResult;
use crate::extractors::StrictJson;
use crate::routes::{seq_to_i64, with_vehicle_deadline};
use crate::state::AppState;

pub async fn post_ascent_notify(
    State(state): State<AppState>,
    body: StrictJson<AscentNotifyRequest>,
) -> ApiResult<Json<AscentNotifyResponse>> {
    let req = body.parsed;
    let cmd_seq = seq_to_i64(req.cmd_seq, "cmd_seq")?;

    with_vehicle_deadline(async {
        let mut conn = state.db.conn().await?;
        let tx = conn.transaction().await?;
        let now = Utc::now();
        let ended_at = req.ts_utc.unwrap_or(now);

        // The device rollup is owned by the ingest path alone; the
        // vehicle's next heartbeat carries its surfaced state.
        let command = db::command_by_mid_seq(&*tx, &req.mid, cmd_seq).await?;
        let transitioned = match command.as_ref() {
            Some(cmd) if cmd.status == CommandStatus::Executing => {
                db::command_finish_executing(&*tx, cmd.id, req.ok, now).await? == 1
            }
            _ => false,
        };
        // A retransmitted notify finds the command already reconciled;
        // that is not an orphan, just the firmware's duplicate send.
        let already_reconciled = matches!(
            command.as_ref().map(|c| c.status),
            Some(CommandStatus::Completed) | Some(CommandStatus::Error)
        );
        let orphan = !transitioned && !already_reconciled;

        let summary = build_summary(&req, orphan);
        let started_at = summary
            .get("duration_s")
            .and_then(Value::as_f64)
            .map(|secs| ended_at - Duration::milliseconds((secs * 1000.0) as i64));

        let dive = db::dive_upsert(
            &*tx,
            &req.mid,
            cmd_seq,
            req.ok,
            Some(&summary),
            started_at,
            Some(ended_at),
            now,
        )
        .await?;

        db::event_log_insert(
            &*tx,
            Some(&req.mid),
            event_type::ASCENT_NOTIFY,
            &serde_json::json!({
                "cmd_seq": cmd_seq,
                "ok": req.ok,
                "dive_id": dive.id,
                "orphan": orphan,
            }),
            now,
        )
        .await?;

        if orphan {
            db::event_log_insert(
                &*tx,
                Some(&req.mid),
                event_type::CMD_ORPHAN_DIVE,
                &serde_json::json!({
                    "cmd_seq": cmd_seq,
                    "command_status": command.as_ref().map(|c| c.status.as_str()),
                }),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            mid = %req.mid,
            cmd_seq,
            ok = req.ok,
            orphan,
            dive_id = dive.id,
            "ascent_notified"
        );
        Ok(())
    })
    .await?;

    Ok(Json(AscentNotifyResponse { ack: true }))
}

/// Fold remarks and the orphan flag into the vehicle's summary blob.
fn build_summary(req: &AscentNotifyRequest, orphan: bool) -> Value {
    let mut summary = req
        .summary
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));
    if let Some(object) = summary.as_object_mut() {
        if let Some(remarks) = &req.remarks {
            object
                .entry("remarks".to_string())
                .or_insert_with(|| Value::from(remarks.clone()));
        }
        if orphan {
            object.insert("orphan".to_string(), Value::from(true));
        }
    }
    summary
}
