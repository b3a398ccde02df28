//! Telemetry read endpoints
//!
//! Latest snapshot, heartbeat history, and the trajectory derivation.
//! Geometry is never stored; coordinates live inside heartbeat payloads and
//! are projected here at read time.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use fathom_core::{
    build_trajectory, FeatureCollection, Heartbeat, TrajectoryFrame, TrajectoryOptions,
};

use crate::db::{self, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{clamp_limit, Cursor, Page};
use crate::types::{HeartbeatItem, LatestTelemetryResponse};

// ============================================================================
// LATEST SNAPSHOT
// ============================================================================

/// GET /api/v1/telemetry/latest/{mid}
pub async fn get_latest(
    State(db): State<DbClient>,
    Path(mid): Path<String>,
) -> ApiResult<Json<LatestTelemetryResponse>> {
    let conn = db.conn().await?;
    let device = db::device_get(&**conn, &mid)
        .await?
        .ok_or_else(|| ApiError::unknown_device(&mid))?;

    let response = match db::heartbeat_latest(&**conn, &mid).await? {
        Some(hb) => {
            let item = HeartbeatItem::from(hb);
            LatestTelemetryResponse {
                mid,
                hb_seq: Some(item.hb_seq),
                ts_utc: item.ts_utc,
                state: item.state,
                position: item.position,
                power: item.power,
                environment: item.environment,
                network: item.network,
            }
        }
        // No heartbeat logged yet; the rollup is the best we have.
        None => LatestTelemetryResponse {
            mid,
            hb_seq: device.last_hb_seq,
            ts_utc: device.last_seen_at,
            state: device.last_state,
            position: device.last_pos,
            power: device.last_pwr,
            environment: device.last_env,
            network: device.last_net,
        },
    };
    Ok(Json(response))
}

// ============================================================================
// HEARTBEAT HISTORY
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListHeartbeatsQuery {
    pub mid: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// GET /api/v1/telemetry/heartbeats
pub async fn list_heartbeats(
    State(db): State<DbClient>,
    Query(params): Query<ListHeartbeatsQuery>,
) -> ApiResult<Json<Page<HeartbeatItem>>> {
    let limit = clamp_limit(params.limit);
    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;

    let conn = db.conn().await?;
    let heartbeats = db::heartbeats_list(
        &**conn,
        &params.mid,
        params.from,
        params.to,
        cursor.as_ref(),
        limit + 1,
    )
    .await?;

    let page = Page::from_overfetch(heartbeats, limit, |hb| {
        Cursor {
            id: hb.id,
            created_at: hb.received_at,
        }
        .encode()
    });
    Ok(Json(Page {
        items: page.items.into_iter().map(HeartbeatItem::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

// ============================================================================
// TRAJECTORY
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrajectoryQuery {
    pub format: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Keep only every Nth frame; must be >= 1.
    pub sampling: Option<u32>,
    /// Gate the per-heartbeat sensor points of the detailed format
    /// (default true).
    pub include_sensors: Option<bool>,
}

/// GET /api/v1/telemetry/trajectory/{mid}
///     ?format=geojson|detailed&from=&to=&sampling=&include_sensors=
pub async fn get_trajectory(
    State(db): State<DbClient>,
    Path(mid): Path<String>,
    Query(params): Query<TrajectoryQuery>,
) -> ApiResult<Json<FeatureCollection>> {
    let detailed = match params.format.as_deref() {
        None | Some("geojson") => false,
        Some("detailed") => true,
        Some(other) => {
            return Err(ApiError::invalid_payload(format!(
                "unknown trajectory format: {other}"
            )))
        }
    };
    if params.sampling == Some(0) {
        return Err(ApiError::invalid_payload("sampling must be at least 1"));
    }

    let conn = db.conn().await?;
    if db::device_get(&**conn, &mid).await?.is_none() {
        return Err(ApiError::unknown_device(&mid));
    }

    // Default window: the last 24 hours, unless the caller bounded it.
    let from = match (params.from, params.to) {
        (None, None) => Some(Utc::now() - Duration::hours(24)),
        (from, _) => from,
    };

    let heartbeats = db::heartbeats_for_trajectory(&**conn, &mid, from, params.to).await?;
    let dives = db::dives_for_mid(&**conn, &mid).await?;

    let frames: Vec<TrajectoryFrame> = heartbeats.into_iter().map(frame_from).collect();
    let options = TrajectoryOptions {
        detailed: detailed && params.include_sensors.unwrap_or(true),
        sampling: params.sampling,
        ..TrajectoryOptions::default()
    };
    Ok(Json(build_trajectory(&mid, &frames, &dives, &options)))
}

fn frame_from(hb: Heartbeat) -> TrajectoryFrame {
    TrajectoryFrame {
        hb_seq: hb.hb_seq,
        ts_utc: hb.ts_utc,
        received_at: hb.received_at,
        payload: hb.payload,
    }
}
