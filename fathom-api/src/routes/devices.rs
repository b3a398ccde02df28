//! Device REST endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use fathom_core::Device;

use crate::constants::ONLINE_THRESHOLD_SECS;
use crate::db::{self, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{clamp_limit, DeviceCursor, Page};
use crate::types::{DeviceDetail, DeviceListItem, DeviceStatusResponse};

fn is_online(device: &Device) -> bool {
    (Utc::now() - device.last_seen_at).num_seconds() < ONLINE_THRESHOLD_SECS
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListDevicesQuery {
    pub state: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// GET /api/v1/devices
pub async fn list_devices(
    State(db): State<DbClient>,
    Query(params): Query<ListDevicesQuery>,
) -> ApiResult<Json<Page<DeviceListItem>>> {
    let limit = clamp_limit(params.limit);
    let cursor = params
        .cursor
        .as_deref()
        .map(DeviceCursor::decode)
        .transpose()?;

    let conn = db.conn().await?;
    let devices = db::devices_list(
        &**conn,
        params.state.as_deref(),
        cursor.as_ref(),
        limit + 1,
    )
    .await?;

    let page = Page::from_overfetch(devices, limit, |d| {
        DeviceCursor {
            mid: d.mid.clone(),
            last_seen_at: d.last_seen_at,
        }
        .encode()
    });
    Ok(Json(Page {
        items: page
            .items
            .iter()
            .map(|d| DeviceListItem::from_device(d, is_online(d)))
            .collect(),
        next_cursor: page.next_cursor,
    }))
}

/// GET /api/v1/devices/{mid}
pub async fn get_device(
    State(db): State<DbClient>,
    Path(mid): Path<String>,
) -> ApiResult<Json<DeviceDetail>> {
    let conn = db.conn().await?;
    let device = db::device_get(&**conn, &mid)
        .await?
        .ok_or_else(|| ApiError::unknown_device(&mid))?;
    let online = is_online(&device);
    Ok(Json(DeviceDetail::from_device(device, online)))
}

/// GET /api/v1/devices/{mid}/status
pub async fn get_device_status(
    State(db): State<DbClient>,
    Path(mid): Path<String>,
) -> ApiResult<Json<DeviceStatusResponse>> {
    let conn = db.conn().await?;
    let device = db::device_get(&**conn, &mid)
        .await?
        .ok_or_else(|| ApiError::unknown_device(&mid))?;
    Ok(Json(DeviceStatusResponse {
        online: is_online(&device),
        mid: device.mid,
        state: device.last_state,
        last_seen_at: device.last_seen_at,
    }))
}
