//! Shared helpers for live-database tests.
//!
//! These tests exercise the real router against PostgreSQL and only run
//! when `FATHOM_TEST_DATABASE_URL` points at a disposable database; without
//! it every test returns early as a skip.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use fathom_api::{create_router, ApiConfig, AppState, DbClient, DbConfig};

pub async fn test_app() -> Option<(Router, DbClient)> {
    let url = std::env::var("FATHOM_TEST_DATABASE_URL").ok()?;
    let db_config = DbConfig { url, pool_size: 4 };
    let db = DbClient::from_config(&db_config).ok()?;
    db.init_schema().await.ok()?;

    let config = ApiConfig {
        admin_reset_enabled: true,
        ..ApiConfig::default()
    };
    Some((create_router(AppState::new(db.clone(), config)), db))
}

/// A fresh machine id per test keeps tests independent without resets.
pub fn fresh_mid() -> String {
    format!("TR4-{}", &Uuid::new_v4().simple().to_string()[..8])
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request build");
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request build");
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body read")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn heartbeat_body(mid: &str, hb_seq: u64, state: &str) -> Value {
    heartbeat_body_at(mid, hb_seq, state, chrono::Utc::now(), 35.1234, 139.5678)
}

pub fn heartbeat_body_at(
    mid: &str,
    hb_seq: u64,
    state: &str,
    ts_utc: chrono::DateTime<chrono::Utc>,
    lat: f64,
    lon: f64,
) -> Value {
    serde_json::json!({
        "mid": mid,
        "fw": "tr4-fw-1.4.2",
        "hb_seq": hb_seq,
        "ts_utc": ts_utc.to_rfc3339(),
        "state": state,
        "position": {"lat": lat, "lon": lon, "nsat": 9},
        "power": {"soc": 84.0, "v_batt": 14.6},
        "environment": {"depth_m": 0.2, "water_temp_c": 18.0},
        "network": {"rsrp_dbm": -95}
    })
}

pub fn run_dive_args() -> Value {
    serde_json::json!({"target_depth_m": 10, "hold_at_depth_s": 30, "cycles": 1})
}
