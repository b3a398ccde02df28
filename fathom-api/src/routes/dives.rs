//! Dive history endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::{self, DbClient};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{clamp_limit, Cursor, Page};
use crate::types::DiveItem;

#[derive(Debug, Deserialize)]
pub struct ListDivesQuery {
    pub mid: Option<String>,
    pub ok: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// GET /api/v1/dives
pub async fn list_dives(
    State(db): State<DbClient>,
    Query(params): Query<ListDivesQuery>,
) -> ApiResult<Json<Page<DiveItem>>> {
    let limit = clamp_limit(params.limit);
    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;

    let conn = db.conn().await?;
    let dives = db::dives_list(
        &**conn,
        params.mid.as_deref(),
        params.ok,
        params.from,
        params.to,
        cursor.as_ref(),
        limit + 1,
    )
    .await?;

    let page = Page::from_overfetch(dives, limit, |d| {
        Cursor {
            id: d.id,
            created_at: d.created_at,
        }
        .encode()
    });
    Ok(Json(Page {
        items: page.items.into_iter().map(DiveItem::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// GET /api/v1/dives/{id}
pub async fn get_dive(
    State(db): State<DbClient>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DiveItem>> {
    let conn = db.conn().await?;
    let dive = db::dive_by_id(&**conn, id)
        .await?
        .ok_or_else(|| ApiError::unknown_command(format!("dive {id} not found")))?;
    Ok(Json(DiveItem::from(dive)))
}
