//! Descent gate
//!
//! `POST /v1/descent-check` is the vehicle's last call before committing to
//! a dive. The decision is a hash comparison and a freshness check, not a
//! planner: the command must exist, be ISSUED, carry the same plan hash the
//! vehicle computed, and have been issued recently enough. Any rejection is
//! authoritative — the command moves to CANCELED so the next heartbeat does
//! not re-deliver it.

use axum::{extract::State, Json};
use chrono::Utc;

use fathom_core::{
    event_type, plan_hash, Command, CommandStatus, DescentCheckRequest, DescentCheckResponse,
    ErrorKind, CMD_RUN_DIVE,
};

use crate::db;
use crate::error::ApiResult;
use crate::extractors::StrictJson;
use crate::routes::{seq_to_i64, with_vehicle_deadline};
use crate::state::AppState;

pub async fn post_descent_check(
    State(state): State<AppState>,
    body: StrictJson<DescentCheckRequest>,
) -> ApiResult<Json<DescentCheckResponse>> {
    let req = body.parsed;
    let raw = body.raw;
    let check_seq = seq_to_i64(req.check_seq, "check_seq")?;
    let cmd_seq = seq_to_i64(req.cmd_seq, "cmd_seq")?;

    let response = with_vehicle_deadline(async {
        let mut conn = state.db.conn().await?;
        let tx = conn.transaction().await?;
        let now = Utc::now();

        // The check log is append-only and keyed on (mid, check_seq); a
        // retransmitted check replays the recorded decision.
        if let Some(existing) = db::descent_check_get(&*tx, &req.mid, check_seq).await? {
            tx.commit().await?;
            return Ok(DescentCheckResponse {
                ok: existing.ok,
                reason: existing.reason,
            });
        }

        // The device rollup is owned by the ingest path alone; this gate
        // only reads and transitions the command row.
        let command = db::command_by_mid_seq(&*tx, &req.mid, cmd_seq).await?;
        let rejection = match evaluate(command.as_ref(), &req.plan_hash, now, &state) {
            Ok(cmd) => {
                if db::command_mark_executing(&*tx, cmd.id, now).await? == 1 {
                    None
                } else {
                    // A concurrent worker moved the command between our
                    // read and the guarded transition.
                    Some(ErrorKind::BadState)
                }
            }
            Err(kind) => Some(kind),
        };

        if let (Some(_), Some(cmd)) = (rejection, command.as_ref()) {
            // No-op unless the command is still ISSUED.
            db::command_cancel_issued(&*tx, cmd.id, now).await?;
        }

        let ok = rejection.is_none();
        let reason = rejection.map(|kind| kind.as_str().to_string());

        db::descent_check_insert_if_absent(
            &*tx,
            &req.mid,
            check_seq,
            cmd_seq,
            &req.plan_hash,
            ok,
            reason.as_deref(),
            &raw,
            now,
        )
        .await?;

        db::event_log_insert(
            &*tx,
            Some(&req.mid),
            event_type::DESCENT_CHECK,
            &serde_json::json!({
                "check_seq": check_seq,
                "cmd_seq": cmd_seq,
                "ok": ok,
                "reason": reason.as_deref(),
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            mid = %req.mid,
            check_seq,
            cmd_seq,
            ok,
            reason = reason.as_deref().unwrap_or("-"),
            "descent_check_processed"
        );
        Ok(DescentCheckResponse { ok, reason })
    })
    .await?;

    Ok(Json(response))
}

/// Steps 1-4 of the gate: resolve, status, hash, freshness. Returns the
/// command cleared to execute, or the rejection reason.
fn evaluate<'a>(
    command: Option<&'a Command>,
    supplied_hash: &str,
    now: chrono::DateTime<Utc>,
    state: &AppState,
) -> Result<&'a Command, ErrorKind> {
    let cmd = command.ok_or(ErrorKind::UnknownCommand)?;
    if cmd.cmd != CMD_RUN_DIVE {
        return Err(ErrorKind::UnknownCommand);
    }
    if cmd.status != CommandStatus::Issued {
        return Err(ErrorKind::BadState);
    }
    if plan_hash(&cmd.cmd, &cmd.args) != supplied_hash.to_ascii_lowercase() {
        return Err(ErrorKind::PlanMismatch);
    }
    let freshness = chrono::Duration::from_std(state.config.descent_freshness)
        .unwrap_or_else(|_| chrono::Duration::seconds(600));
    if cmd.issued_at.is_none_or(|issued| now - issued > freshness) {
        return Err(ErrorKind::Stale);
    }
    Ok(cmd)
}
