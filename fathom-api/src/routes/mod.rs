//! REST API Routes Module
//!
//! Two trees: the vehicle-facing protocol under `/v1` and the operator Web
//! API under `/api/v1`, plus the health probe and the development-only
//! admin reset at the root.

pub mod admin;
pub mod ascent;
pub mod commands;
pub mod descent;
pub mod devices;
pub mod dives;
pub mod events;
pub mod hb;
pub mod health;
pub mod telemetry;

use std::future::Future;
use std::time::Duration;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::constants::VEHICLE_REQUEST_TIMEOUT_SECS;
use crate::db::RollupSnapshot;
use crate::error::{ApiError, ApiResult};
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    let vehicle = Router::new()
        .route("/hb", post(hb::post_heartbeat))
        .route("/descent-check", post(descent::post_descent_check))
        .route("/ascent-notify", post(ascent::post_ascent_notify));

    let web = Router::new()
        .route("/devices", get(devices::list_devices))
        .route("/devices/{mid}", get(devices::get_device))
        .route("/devices/{mid}/status", get(devices::get_device_status))
        .route(
            "/commands",
            post(commands::enqueue_command).get(commands::list_commands),
        )
        .route("/commands/{id}", get(commands::get_command))
        .route("/telemetry/latest/{mid}", get(telemetry::get_latest))
        .route("/telemetry/heartbeats", get(telemetry::list_heartbeats))
        .route("/telemetry/trajectory/{mid}", get(telemetry::get_trajectory))
        .route("/dives", get(dives::list_dives))
        .route("/dives/{id}", get(dives::get_dive))
        .route("/events", get(events::list_events));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v1", vehicle)
        .nest("/api/v1", web)
        .route("/health", get(health::health_check))
        .route("/admin/reset-db", post(admin::reset_db))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Cap a vehicle-facing handler at the hard wall-clock deadline. Past it
/// the vehicle gets a 503 and retries on its next heartbeat cadence.
pub(crate) async fn with_vehicle_deadline<F, T>(fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    tokio::time::timeout(Duration::from_secs(VEHICLE_REQUEST_TIMEOUT_SECS), fut)
        .await
        .unwrap_or_else(|_| Err(ApiError::unavailable("request deadline exceeded")))
}

/// Pull the telemetry groups out of a raw vehicle payload for the device
/// rollup.
pub(crate) fn snapshot_from(raw: &Value) -> RollupSnapshot<'_> {
    let group = |key: &str| raw.get(key).filter(|v| !v.is_null());
    RollupSnapshot {
        pos: group("position"),
        pwr: group("power"),
        env: group("environment"),
        net: group("network"),
    }
}

/// Vehicle sequence numbers are u64 on the wire but BIGINT at rest.
pub(crate) fn seq_to_i64(value: u64, field: &str) -> ApiResult<i64> {
    i64::try_from(value).map_err(|_| ApiError::invalid_payload(format!("{field} out of range")))
}
