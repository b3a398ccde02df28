//! Admin endpoints
//!
//! Destructive, development-only operations. Production deployments leave
//! `ADMIN_RESET_ENABLED` unset and this whole surface refuses to act.

use axum::{extract::State, Json};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::SimpleMessage;

/// POST /admin/reset-db - truncate all tables and restart identities.
pub async fn reset_db(State(state): State<AppState>) -> ApiResult<Json<SimpleMessage>> {
    if !state.config.admin_reset_enabled {
        return Err(ApiError::conflict(
            "database reset is disabled; set ADMIN_RESET_ENABLED=true to allow it",
        ));
    }

    state.db.reset_db().await?;
    tracing::warn!("database reset complete");
    Ok(Json(SimpleMessage {
        message: "database reset complete".to_string(),
    }))
}
