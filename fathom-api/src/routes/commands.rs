//! Command enqueue and history endpoints
//!
//! Enqueue allocates the per-device sequence and the plan hash inside one
//! transaction, with the device row locked so two concurrent enqueues for
//! the same vehicle serialize: exactly one wins, the other sees the
//! winner's in-flight command and gets a CONFLICT.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use fathom_core::{event_type, plan_hash, CommandStatus, RunDiveArgs, CMD_RUN_DIVE};

use crate::db::{self, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::extractors::StrictJson;
use crate::pagination::{clamp_limit, Cursor, Page};
use crate::state::AppState;
use crate::types::{CommandResponse, EnqueueCommandRequest};

// ============================================================================
// ENQUEUE
// ============================================================================

/// POST /api/v1/commands
pub async fn enqueue_command(
    State(state): State<AppState>,
    body: StrictJson<EnqueueCommandRequest>,
) -> ApiResult<Json<CommandResponse>> {
    let req = body.parsed;
    if req.cmd != CMD_RUN_DIVE {
        return Err(ApiError::invalid_payload(format!(
            "unsupported command kind: {}",
            req.cmd
        )));
    }
    let args: RunDiveArgs = serde_json::from_value(req.args.clone())
        .map_err(|err| ApiError::invalid_payload(format!("invalid RUN_DIVE args: {err}")))?;
    args.validate()
        .map_err(|err| ApiError::invalid_payload(err.to_string()))?;

    let mut conn = state.db.conn().await?;
    let tx = conn.transaction().await?;
    let now = Utc::now();

    if !db::device_lock(&*tx, &req.mid).await? {
        return Err(ApiError::unknown_device(&req.mid));
    }
    if db::command_in_flight_exists(&*tx, &req.mid).await? {
        return Err(ApiError::conflict(format!(
            "device {} already has a command in flight",
            req.mid
        )));
    }

    let seq = db::command_next_seq(&*tx, &req.mid).await?;
    let hash = plan_hash(&req.cmd, &req.args);
    let command = db::command_insert(
        &*tx,
        &req.mid,
        seq,
        &req.cmd,
        &req.args,
        &hash,
        Some("web_api"),
        now,
    )
    .await?;

    db::event_log_insert(
        &*tx,
        Some(&req.mid),
        event_type::CMD_ENQUEUED,
        &serde_json::json!({
            "cmd_seq": seq,
            "cmd": req.cmd,
            "plan_hash": hash,
        }),
        now,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(mid = %req.mid, cmd_seq = seq, "command_enqueued");
    Ok(Json(CommandResponse::from(command)))
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListCommandsQuery {
    pub mid: Option<String>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// GET /api/v1/commands
pub async fn list_commands(
    State(db): State<DbClient>,
    Query(params): Query<ListCommandsQuery>,
) -> ApiResult<Json<Page<CommandResponse>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse::<CommandStatus>()
                .map_err(|err| ApiError::invalid_payload(err.to_string()))
        })
        .transpose()?;
    let limit = clamp_limit(params.limit);
    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;

    let conn = db.conn().await?;
    let commands = db::commands_list(
        &**conn,
        params.mid.as_deref(),
        status,
        params.from,
        params.to,
        cursor.as_ref(),
        limit + 1,
    )
    .await?;

    let page = Page::from_overfetch(commands, limit, |c| {
        Cursor {
            id: c.id,
            created_at: c.created_at,
        }
        .encode()
    });
    Ok(Json(Page {
        items: page.items.into_iter().map(CommandResponse::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// GET /api/v1/commands/{id}
pub async fn get_command(
    State(db): State<DbClient>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CommandResponse>> {
    let conn = db.conn().await?;
    let command = db::command_by_id(&**conn, id)
        .await?
        .ok_or_else(|| ApiError::unknown_command(format!("command {id} not found")))?;
    Ok(Json(CommandResponse::from(command)))
}
