//! End-to-End Lifecycle Scenarios
//!
//! Drives the full router against a live database:
//! - dispatch and complete (enqueue -> hb -> descent -> ascent)
//! - plan tamper rejection
//! - duplicate-heartbeat idempotence
//! - expiration sweep
//! - concurrent enqueue conflict
//!
//! Requires `FATHOM_TEST_DATABASE_URL`; skipped otherwise.

mod test_support;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use test_support::{fresh_mid, get, heartbeat_body, post_json, run_dive_args, test_app};

macro_rules! require_app {
    () => {
        match test_app().await {
            Some(pair) => pair,
            None => {
                eprintln!("skipping: FATHOM_TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}

#[tokio::test]
async fn dispatch_and_complete_lifecycle() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    // Device appears on first heartbeat; nothing queued yet.
    let (status, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ack"], json!(true));
    assert_eq!(body["command"], Value::Null);

    // Operator enqueues a dive.
    let (status, enqueued) = post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(enqueued["seq"], json!(1));
    assert_eq!(enqueued["status"], json!("QUEUED"));

    // Next heartbeat pulls it.
    let (status, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 2, "SURFACE_WAIT")).await;
    assert_eq!(status, StatusCode::OK);
    let command = &body["command"];
    assert_eq!(command["seq"], json!(1));
    assert_eq!(command["cmd"], json!("RUN_DIVE"));
    let plan_hash = command["plan_hash"].as_str().expect("plan hash").to_string();

    // Pre-dive gate passes with the matching hash.
    let (status, verdict) = post_json(
        &app,
        "/v1/descent-check",
        json!({
            "mid": mid,
            "ts_utc": Utc::now().to_rfc3339(),
            "check_seq": 1,
            "cmd_seq": 1,
            "plan_hash": plan_hash,
            "position": {"lat": 35.1234, "lon": 139.5678}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["ok"], json!(true));

    let (_, listed) = get(&app, &format!("/api/v1/commands?mid={mid}")).await;
    assert_eq!(listed["items"][0]["status"], json!("EXECUTING"));

    // The vehicle surfaces and reports success.
    let (status, ack) = post_json(
        &app,
        "/v1/ascent-notify",
        json!({
            "mid": mid,
            "ts_utc": Utc::now().to_rfc3339(),
            "cmd_seq": 1,
            "ok": true,
            "summary": {"max_depth_m": 9.8, "duration_s": 95, "cycles": [{"depth_m": 9.8}]}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ack"], json!(true));

    let (_, listed) = get(&app, &format!("/api/v1/commands?mid={mid}")).await;
    assert_eq!(listed["items"][0]["status"], json!("COMPLETED"));

    let (_, dives) = get(&app, &format!("/api/v1/dives?mid={mid}")).await;
    assert_eq!(dives["items"][0]["cmd_seq"], json!(1));
    assert_eq!(dives["items"][0]["ok"], json!(true));
    assert_eq!(dives["items"][0]["summary"]["max_depth_m"], json!(9.8));
}

#[tokio::test]
async fn tampered_plan_hash_cancels_command() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;
    post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;
    let (_, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 2, "SURFACE_WAIT")).await;
    assert_eq!(body["command"]["seq"], json!(1));

    let (status, verdict) = post_json(
        &app,
        "/v1/descent-check",
        json!({
            "mid": mid,
            "check_seq": 1,
            "cmd_seq": 1,
            "plan_hash": "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["ok"], json!(false));
    assert_eq!(verdict["reason"], json!("PLAN_MISMATCH"));

    let (_, listed) = get(&app, &format!("/api/v1/commands?mid={mid}")).await;
    assert_eq!(listed["items"][0]["status"], json!("CANCELED"));

    // The canceled command must not come back.
    let (_, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 3, "SURFACE_WAIT")).await;
    assert_eq!(body["command"], Value::Null);
}

#[tokio::test]
async fn duplicate_heartbeat_replays_same_command() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;
    post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;

    let body = heartbeat_body(&mid, 7, "SURFACE_WAIT");
    let (_, first) = post_json(&app, "/v1/hb", body.clone()).await;
    assert_eq!(first["command"]["seq"], json!(1));

    // The firmware duplicates sends on poor links; the replay must hand
    // back the same command, not drain the queue further.
    let (_, second) = post_json(&app, "/v1/hb", body).await;
    assert_eq!(second, first);

    // Exactly one heartbeat row exists for the pair.
    let (_, heartbeats) = get(&app, &format!("/api/v1/telemetry/heartbeats?mid={mid}")).await;
    let sevens = heartbeats["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter(|item| item["hb_seq"] == json!(7))
        .count();
    assert_eq!(sevens, 1);
}

#[tokio::test]
async fn unpolled_command_expires_and_stays_out_of_dispatch() {
    let (app, db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;
    post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;

    // Age the command past the TTL, then run the sweep's mutation with the
    // production cutoff. Other devices' fresh commands stay untouched.
    let mut conn = db.conn().await.expect("conn");
    conn.execute(
        "UPDATE commands SET created_at = now() - interval '2 hours' WHERE mid = $1",
        &[&mid.as_str()],
    )
    .await
    .expect("age command");
    let tx = conn.transaction().await.expect("tx");
    let now = Utc::now();
    let expired = fathom_api::db::command_expire_batch(&*tx, now - Duration::hours(1), now)
        .await
        .expect("expire");
    tx.commit().await.expect("commit");
    assert!(expired.iter().any(|c| c.mid == mid));

    let (_, listed) = get(&app, &format!("/api/v1/commands?mid={mid}")).await;
    assert_eq!(listed["items"][0]["status"], json!("EXPIRED"));

    let (_, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 2, "SURFACE_WAIT")).await;
    assert_eq!(body["command"], Value::Null);
}

#[tokio::test]
async fn concurrent_enqueue_admits_exactly_one() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;

    let request = json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()});
    let (first, second) = tokio::join!(
        post_json(&app, "/api/v1/commands", request.clone()),
        post_json(&app, "/api/v1/commands", request),
    );

    let statuses = [first.0, second.0];
    assert!(statuses.contains(&StatusCode::OK), "one enqueue succeeds");
    assert!(
        statuses.contains(&StatusCode::CONFLICT),
        "the other sees CONFLICT, got {statuses:?}"
    );
    let conflict_body = if first.0 == StatusCode::CONFLICT {
        &first.1
    } else {
        &second.1
    };
    assert_eq!(conflict_body["error"]["kind"], json!("CONFLICT"));
}

#[tokio::test]
async fn stale_issuance_is_rejected_and_canceled() {
    let (app, db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;
    post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;
    let (_, body) = post_json(&app, "/v1/hb", heartbeat_body(&mid, 2, "SURFACE_WAIT")).await;
    let plan_hash = body["command"]["plan_hash"].as_str().expect("hash").to_string();

    // Age the issuance past the freshness window.
    let conn = db.conn().await.expect("conn");
    conn.execute(
        "UPDATE commands SET issued_at = now() - interval '11 minutes' WHERE mid = $1",
        &[&mid.as_str()],
    )
    .await
    .expect("age issuance");

    let (_, verdict) = post_json(
        &app,
        "/v1/descent-check",
        json!({"mid": mid, "check_seq": 1, "cmd_seq": 1, "plan_hash": plan_hash}),
    )
    .await;
    assert_eq!(verdict["ok"], json!(false));
    assert_eq!(verdict["reason"], json!("STALE"));

    let (_, listed) = get(&app, &format!("/api/v1/commands?mid={mid}")).await;
    assert_eq!(listed["items"][0]["status"], json!("CANCELED"));
}

#[tokio::test]
async fn orphan_ascent_records_flagged_dive() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 1, "SURFACE_WAIT")).await;

    // Ascent for a command that was never enqueued at all.
    let (status, ack) = post_json(
        &app,
        "/v1/ascent-notify",
        json!({"mid": mid, "cmd_seq": 42, "ok": false, "summary": {"duration_s": 10}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ack"], json!(true));

    let (_, dives) = get(&app, &format!("/api/v1/dives?mid={mid}")).await;
    assert_eq!(dives["items"][0]["summary"]["orphan"], json!(true));
}

#[tokio::test]
async fn malformed_heartbeat_is_rejected_with_error_kind() {
    let (app, _db) = require_app!();

    let (status, body) = post_json(&app, "/v1/hb", json!({"mid": "TR4-000"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("INVALID_PAYLOAD"));
}

#[tokio::test]
async fn rollup_ignores_out_of_order_frames() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    post_json(&app, "/v1/hb", heartbeat_body(&mid, 5, "SURFACE_WAIT")).await;
    // A late frame with a smaller hb_seq must not clobber the rollup.
    post_json(&app, "/v1/hb", heartbeat_body(&mid, 3, "DIVE")).await;

    let (_, device) = get(&app, &format!("/api/v1/devices/{mid}")).await;
    assert_eq!(device["last_hb_seq"], json!(5));
    assert_eq!(device["state"], json!("SURFACE_WAIT"));
}

#[tokio::test]
async fn trajectory_endpoint_returns_feature_collection() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();

    for hb_seq in 1..=5u64 {
        post_json(&app, "/v1/hb", heartbeat_body(&mid, hb_seq, "SURFACE_WAIT")).await;
    }

    let (status, fc) = get(
        &app,
        &format!("/api/v1/telemetry/trajectory/{mid}?format=geojson"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fc["type"], json!("FeatureCollection"));
    let types: Vec<&str> = fc["features"]
        .as_array()
        .expect("features")
        .iter()
        .filter_map(|f| f["properties"]["type"].as_str())
        .collect();
    assert!(types.contains(&"trajectory"));
    assert!(types.contains(&"current"));

    let (status, _) = get(
        &app,
        &format!("/api/v1/telemetry/trajectory/{mid}?format=kml"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_dive_renders_split_track_with_markers() {
    let (app, _db) = require_app!();
    let mid = fresh_mid();
    let base = Utc::now() - Duration::minutes(30);
    let hb_at = |hb_seq: u64, minute: i64, state: &str| {
        test_support::heartbeat_body_at(
            &mid,
            hb_seq,
            state,
            base + Duration::minutes(minute),
            35.0 + hb_seq as f64 * 0.001,
            139.5,
        )
    };

    // Surface run-up: device appears, command is enqueued and pulled.
    post_json(&app, "/v1/hb", hb_at(1, 1, "SURFACE_WAIT")).await;
    post_json(
        &app,
        "/api/v1/commands",
        json!({"mid": mid, "cmd": "RUN_DIVE", "args": run_dive_args()}),
    )
    .await;
    let (_, body) = post_json(&app, "/v1/hb", hb_at(2, 2, "SURFACE_WAIT")).await;
    let plan_hash = body["command"]["plan_hash"].as_str().expect("hash").to_string();

    let (_, verdict) = post_json(
        &app,
        "/v1/descent-check",
        json!({"mid": mid, "check_seq": 1, "cmd_seq": 1, "plan_hash": plan_hash}),
    )
    .await;
    assert_eq!(verdict["ok"], json!(true));

    for hb_seq in 3..=7u64 {
        post_json(&app, "/v1/hb", hb_at(hb_seq, hb_seq as i64, "SURFACE_WAIT")).await;
    }
    for hb_seq in 8..=11u64 {
        post_json(&app, "/v1/hb", hb_at(hb_seq, hb_seq as i64, "AT_DEPTH")).await;
    }

    // Surfacing report: 240 s dive ending at minute 11.5 puts the dive
    // window over exactly the AT_DEPTH frames.
    let (_, ack) = post_json(
        &app,
        "/v1/ascent-notify",
        json!({
            "mid": mid,
            "ts_utc": (base + Duration::seconds(690)).to_rfc3339(),
            "cmd_seq": 1,
            "ok": true,
            "summary": {"max_depth_m": 9.8, "duration_s": 240}
        }),
    )
    .await;
    assert_eq!(ack["ack"], json!(true));

    for hb_seq in 12..=15u64 {
        post_json(&app, "/v1/hb", hb_at(hb_seq, hb_seq as i64, "SURFACE_WAIT")).await;
    }

    let (status, fc) = get(
        &app,
        &format!("/api/v1/telemetry/trajectory/{mid}?format=geojson"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let count = |t: &str| {
        fc["features"]
            .as_array()
            .expect("features")
            .iter()
            .filter(|f| f["properties"]["type"] == json!(t))
            .count()
    };
    assert_eq!(count("trajectory"), 2, "surface track splits around the dive");
    assert_eq!(count("dive"), 1);
    assert_eq!(count("dive_marker"), 2);
    assert_eq!(count("current"), 1);
    assert_eq!(count("deployment"), 1);

    let dive_feature = fc["features"]
        .as_array()
        .expect("features")
        .iter()
        .find(|f| f["properties"]["type"] == json!("dive"))
        .expect("dive feature");
    assert_eq!(dive_feature["properties"]["max_depth_m"], json!(9.8));
    assert_eq!(dive_feature["geometry"]["type"], json!("LineString"));

    assert_eq!(fc["statistics"]["max_depth_m"], json!(9.8));
    assert!(fc["statistics"]["avg_battery_soc"].as_f64().is_some());
}

#[tokio::test]
async fn health_probe_reports_database() {
    let (app, _db) = require_app!();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["db"], json!(true));
}
