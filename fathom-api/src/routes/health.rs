//! Health probe

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::db::DbClient;
use crate::types::HealthResponse;

/// GET /health - trivial SELECT against the database.
pub async fn health_check(State(db): State<DbClient>) -> impl IntoResponse {
    match db.health_check().await {
        Ok(db_ok) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                db: db_ok,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    db: false,
                }),
            )
        }
    }
}
