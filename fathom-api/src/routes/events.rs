//! Event log endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::{self, DbClient};
use crate::error::ApiResult;
use crate::pagination::{clamp_limit, Cursor, Page};
use crate::types::EventItem;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub mid: Option<String>,
    pub event_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// GET /api/v1/events
pub async fn list_events(
    State(db): State<DbClient>,
    Query(params): Query<ListEventsQuery>,
) -> ApiResult<Json<Page<EventItem>>> {
    let limit = clamp_limit(params.limit);
    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;

    let conn = db.conn().await?;
    let events = db::events_list(
        &**conn,
        params.mid.as_deref(),
        params.event_type.as_deref(),
        params.from,
        params.to,
        cursor.as_ref(),
        limit + 1,
    )
    .await?;

    let page = Page::from_overfetch(events, limit, |e| {
        Cursor {
            id: e.id,
            created_at: e.created_at,
        }
        .encode()
    });
    Ok(Json(Page {
        items: page.items.into_iter().map(EventItem::from).collect(),
        next_cursor: page.next_cursor,
    }))
}
