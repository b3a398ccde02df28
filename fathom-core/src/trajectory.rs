//! Trajectory derivation
//!
//! Transforms a heartbeat stream plus the dive history into a GeoJSON
//! FeatureCollection ready for map rendering: surface track LineStrings,
//! one LineString per dive, start/end dive markers, and a current-position
//! point. The builder is a single pass over the frames; the only state
//! carried between frames is the current segment buffer and the current
//! dive id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Dive, Position};

// ============================================================================
// GEOJSON TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    /// Aggregate sensor statistics over the window, carried as a foreign
    /// member alongside the features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<TrajectoryStatistics>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            statistics: None,
        }
    }
}

/// Window-wide aggregates for the operator dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStatistics {
    pub avg_depth_m: Option<f64>,
    pub max_depth_m: Option<f64>,
    pub avg_battery_soc: Option<f64>,
    pub avg_rsrp_dbm: Option<f64>,
    pub min_rsrp_dbm: Option<f64>,
    pub max_rsrp_dbm: Option<f64>,
    pub avg_water_temp_c: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

impl Feature {
    pub fn line_string(coordinates: Vec<[f64; 3]>, properties: Map<String, Value>) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "LineString".to_string(),
                coordinates: serde_json::to_value(coordinates)
                    .expect("coordinate serialization is infallible"),
            },
            properties,
        }
    }

    pub fn point(coordinate: [f64; 3], properties: Map<String, Value>) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "Point".to_string(),
                coordinates: serde_json::to_value(coordinate)
                    .expect("coordinate serialization is infallible"),
            },
            properties,
        }
    }

    /// The `properties.type` tag, if any.
    pub fn feature_type(&self) -> Option<&str> {
        self.properties.get("type").and_then(Value::as_str)
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// One heartbeat frame as stored: timestamps plus the opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryFrame {
    pub hb_seq: i64,
    pub ts_utc: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct TrajectoryOptions {
    /// Additionally emit one Point per heartbeat with the payload flattened
    /// into properties.
    pub detailed: bool,
    /// Keep only every Nth frame. Values below 2 mean no thinning.
    pub sampling: Option<u32>,
    /// Beyond this divergence between `ts_utc` and `received_at`, the
    /// receive time wins and the frame is tagged `clock_skew`.
    pub clock_skew_tolerance: Duration,
}

impl Default for TrajectoryOptions {
    fn default() -> Self {
        Self {
            detailed: false,
            sampling: None,
            clock_skew_tolerance: Duration::hours(1),
        }
    }
}

// ============================================================================
// INTERNAL SEGMENTATION MODEL
// ============================================================================

#[derive(Debug, Clone)]
struct FramePoint {
    lon: f64,
    lat: f64,
    depth_m: f64,
    hb_seq: i64,
    ts: DateTime<Utc>,
    state: String,
    clock_skew: bool,
    payload: Value,
}

impl FramePoint {
    fn coordinate(&self) -> [f64; 3] {
        [self.lon, self.lat, self.depth_m]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Surface,
    Dive(i64),
}

#[derive(Debug, Clone)]
struct Segment {
    kind: SegmentKind,
    points: Vec<FramePoint>,
}

/// A dive's effective time window. `started_at` falls back to
/// `ended_at - summary.duration_s` when the reconciler could not persist it.
#[derive(Debug, Clone, Copy)]
struct DiveWindow {
    dive_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn dive_window(dive: &Dive) -> Option<DiveWindow> {
    let end = dive.ended_at?;
    let start = dive.started_at.or_else(|| {
        let duration_s = summary_f64(dive, "duration_s")?;
        Some(end - Duration::milliseconds((duration_s * 1000.0) as i64))
    })?;
    Some(DiveWindow {
        dive_id: dive.id,
        start,
        end,
    })
}

fn summary_f64(dive: &Dive, key: &str) -> Option<f64> {
    dive.summary.as_ref()?.get(key)?.as_f64()
}

// ============================================================================
// BUILDER
// ============================================================================

/// Derive the GeoJSON FeatureCollection for one device.
///
/// Frames are ordered by `hb_seq`; frames without a usable position are
/// dropped. Dive membership comes from the Dive table's time windows, so a
/// mission that straddles several heartbeats splits the surface track
/// around it.
pub fn build_trajectory(
    mid: &str,
    frames: &[TrajectoryFrame],
    dives: &[Dive],
    opts: &TrajectoryOptions,
) -> FeatureCollection {
    let mut ordered: Vec<&TrajectoryFrame> = frames.iter().collect();
    ordered.sort_by_key(|f| f.hb_seq);
    if let Some(step) = opts.sampling.filter(|n| *n > 1) {
        ordered = ordered.into_iter().step_by(step as usize).collect();
    }

    let mut windows: Vec<DiveWindow> = dives.iter().filter_map(dive_window).collect();
    windows.sort_by_key(|w| w.start);

    // Single pass: project frames, classify against dive windows, and grow
    // the current segment buffer until the classification changes.
    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<Segment> = None;

    for frame in ordered {
        let Some(point) = project_frame(frame, opts.clock_skew_tolerance) else {
            continue;
        };
        let kind = windows
            .iter()
            .find(|w| w.start <= point.ts && point.ts <= w.end)
            .map(|w| SegmentKind::Dive(w.dive_id))
            .unwrap_or(SegmentKind::Surface);

        match current.as_mut() {
            Some(segment) if segment.kind == kind => segment.points.push(point),
            Some(_) => {
                segments.extend(current.take());
                current = Some(Segment {
                    kind,
                    points: vec![point],
                });
            }
            None => {
                current = Some(Segment {
                    kind,
                    points: vec![point],
                });
            }
        }
    }
    segments.extend(current.take());

    merge_single_frame_segments(&mut segments);

    let mut features = Vec::new();
    emit_surface_segments(mid, &segments, &mut features);
    emit_dive_features(mid, dives, &windows, &segments, &mut features);
    emit_deployment_point(&segments, &mut features);
    emit_current_point(&segments, &mut features);
    if opts.detailed {
        emit_detail_points(&segments, &mut features);
    }

    let mut collection = FeatureCollection::new(features);
    collection.statistics = Some(compute_statistics(&segments, dives));
    collection
}

/// Project a stored frame into a plottable point, or None when the frame
/// carries no usable position.
fn project_frame(frame: &TrajectoryFrame, tolerance: Duration) -> Option<FramePoint> {
    let position: Position =
        serde_json::from_value(frame.payload.get("position")?.clone()).ok()?;
    if !position.is_valid() {
        return None;
    }
    let depth_m = frame
        .payload
        .get("environment")
        .and_then(|env| env.get("depth_m"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let state = frame
        .payload
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();

    let skewed = (frame.ts_utc - frame.received_at).abs() > tolerance;
    let ts = if skewed { frame.received_at } else { frame.ts_utc };

    Some(FramePoint {
        lon: position.lon,
        lat: position.lat,
        depth_m,
        hb_seq: frame.hb_seq,
        ts,
        state,
        clock_skew: skewed,
        payload: frame.payload.clone(),
    })
}

/// A classification flip that would strand a single frame joins that frame
/// to its neighbor instead of producing a degenerate segment.
fn merge_single_frame_segments(segments: &mut Vec<Segment>) {
    let mut i = 0;
    while i < segments.len() {
        if segments[i].points.len() == 1 && segments.len() > 1 {
            let orphan = segments.remove(i);
            if i > 0 {
                segments[i - 1].points.extend(orphan.points);
                // The neighbor may now abut a same-kind segment; fold it in.
                if i < segments.len() && segments[i - 1].kind == segments[i].kind {
                    let tail = segments.remove(i);
                    segments[i - 1].points.extend(tail.points);
                }
            } else {
                segments[0].points.splice(0..0, orphan.points);
            }
        } else {
            i += 1;
        }
    }
}

fn emit_surface_segments(mid: &str, segments: &[Segment], features: &mut Vec<Feature>) {
    let mut index = 0;
    for segment in segments {
        if segment.kind != SegmentKind::Surface || segment.points.len() < 2 {
            continue;
        }
        let coords: Vec<[f64; 3]> = segment.points.iter().map(FramePoint::coordinate).collect();
        let mut distance_m = 0.0;
        for pair in segment.points.windows(2) {
            distance_m += haversine_m(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon);
        }
        let mut props = Map::new();
        props.insert("type".into(), Value::from("trajectory"));
        props.insert("mid".into(), Value::from(mid));
        props.insert("segment_index".into(), Value::from(index));
        props.insert(
            "start_time".into(),
            Value::from(segment.points[0].ts.to_rfc3339()),
        );
        props.insert(
            "end_time".into(),
            Value::from(segment.points[segment.points.len() - 1].ts.to_rfc3339()),
        );
        props.insert("total_distance_m".into(), Value::from(distance_m));
        features.push(Feature::line_string(coords, props));
        index += 1;
    }
}

fn emit_dive_features(
    mid: &str,
    dives: &[Dive],
    windows: &[DiveWindow],
    segments: &[Segment],
    features: &mut Vec<Feature>,
) {
    for dive in dives {
        let Some(window) = windows.iter().find(|w| w.dive_id == dive.id) else {
            continue;
        };
        let coords = dive_coordinates(dive.id, window, segments);
        if coords.is_empty() {
            continue;
        }
        let start = coords[0];
        let end = coords[coords.len() - 1];

        let mut props = Map::new();
        props.insert("type".into(), Value::from("dive"));
        props.insert("mid".into(), Value::from(mid));
        props.insert("dive_id".into(), Value::from(dive.id));
        props.insert("cmd_seq".into(), Value::from(dive.cmd_seq));
        props.insert(
            "max_depth_m".into(),
            summary_f64(dive, "max_depth_m").map(Value::from).unwrap_or(Value::Null),
        );
        props.insert(
            "duration_s".into(),
            summary_f64(dive, "duration_s").map(Value::from).unwrap_or(Value::Null),
        );
        props.insert("started_at".into(), Value::from(window.start.to_rfc3339()));
        props.insert("ended_at".into(), Value::from(window.end.to_rfc3339()));
        features.push(Feature::line_string(coords, props));

        for (marker_type, coordinate, ts) in [
            ("start", start, window.start),
            ("end", end, window.end),
        ] {
            let mut marker = Map::new();
            marker.insert("type".into(), Value::from("dive_marker"));
            marker.insert("marker_type".into(), Value::from(marker_type));
            marker.insert("mid".into(), Value::from(mid));
            marker.insert("dive_id".into(), Value::from(dive.id));
            marker.insert("timestamp".into(), Value::from(ts.to_rfc3339()));
            features.push(Feature::point(coordinate, marker));
        }
    }
}

/// Coordinates for one dive's LineString. Preferred source is the dive's
/// own segment; a dive whose window caught fewer than two frames (the
/// vehicle is submerged and silent mid-dive) falls back to the frames
/// bracketing the window.
fn dive_coordinates(dive_id: i64, window: &DiveWindow, segments: &[Segment]) -> Vec<[f64; 3]> {
    let own: Vec<[f64; 3]> = segments
        .iter()
        .filter(|s| s.kind == SegmentKind::Dive(dive_id))
        .flat_map(|s| s.points.iter().map(FramePoint::coordinate))
        .collect();
    if own.len() >= 2 {
        return own;
    }

    let all_points = || segments.iter().flat_map(|s| s.points.iter());
    let before = all_points()
        .filter(|p| p.ts <= window.start)
        .max_by_key(|p| p.ts)
        .map(FramePoint::coordinate);
    let after = all_points()
        .filter(|p| p.ts >= window.end)
        .min_by_key(|p| p.ts)
        .map(FramePoint::coordinate);

    match (before, after) {
        (Some(a), Some(b)) => vec![a, b],
        (Some(a), None) if own.len() == 1 => vec![a, own[0]],
        (None, Some(b)) if own.len() == 1 => vec![own[0], b],
        _ => own,
    }
}

/// Where the vehicle first surfaced in this window; the release point on
/// the operator map.
fn emit_deployment_point(segments: &[Segment], features: &mut Vec<Feature>) {
    let Some(first) = segments.iter().flat_map(|s| s.points.iter()).next() else {
        return;
    };
    let mut props = Map::new();
    props.insert("type".into(), Value::from("deployment"));
    props.insert("timestamp".into(), Value::from(first.ts.to_rfc3339()));
    features.push(Feature::point(first.coordinate(), props));
}

fn emit_current_point(segments: &[Segment], features: &mut Vec<Feature>) {
    let Some(last) = segments.iter().rev().flat_map(|s| s.points.iter().rev()).next() else {
        return;
    };
    let mut props = Map::new();
    props.insert("type".into(), Value::from("current"));
    props.insert("timestamp".into(), Value::from(last.ts.to_rfc3339()));
    props.insert("state".into(), Value::from(last.state.as_str()));
    features.push(Feature::point(last.coordinate(), props));
}

fn emit_detail_points(segments: &[Segment], features: &mut Vec<Feature>) {
    for point in segments.iter().flat_map(|s| s.points.iter()) {
        let mut props = Map::new();
        props.insert("hb_seq".into(), Value::from(point.hb_seq));
        props.insert("timestamp".into(), Value::from(point.ts.to_rfc3339()));
        if point.clock_skew {
            props.insert("clock_skew".into(), Value::from(true));
        }
        if let Some(payload) = point.payload.as_object() {
            for (key, value) in payload {
                props.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        features.push(Feature::point(point.coordinate(), props));
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Aggregate the sensor groups across every plotted frame. The depth
/// maximum prefers the dive summaries (the vehicle measures its own dives
/// far more often than it heartbeats).
fn compute_statistics(segments: &[Segment], dives: &[Dive]) -> TrajectoryStatistics {
    let mut depths = Vec::new();
    let mut socs = Vec::new();
    let mut rsrps = Vec::new();
    let mut water_temps = Vec::new();

    for point in segments.iter().flat_map(|s| s.points.iter()) {
        let sample = |group: &str, key: &str| {
            point.payload.get(group)?.get(key)?.as_f64()
        };
        if let Some(depth) = sample("environment", "depth_m") {
            depths.push(depth);
        }
        if let Some(temp) = sample("environment", "water_temp_c") {
            water_temps.push(temp);
        }
        if let Some(soc) = sample("power", "soc") {
            socs.push(soc);
        }
        if let Some(rsrp) = sample("network", "rsrp_dbm") {
            rsrps.push(rsrp);
        }
    }

    let max_dive_depth = dives
        .iter()
        .filter_map(|d| summary_f64(d, "max_depth_m"))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    TrajectoryStatistics {
        avg_depth_m: mean(&depths),
        max_depth_m: max_dive_depth.or_else(|| fold_max(&depths)),
        avg_battery_soc: mean(&socs),
        avg_rsrp_dbm: mean(&rsrps),
        min_rsrp_dbm: fold_min(&rsrps),
        max_rsrp_dbm: fold_max(&rsrps),
        avg_water_temp_c: mean(&water_temps),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn fold_max(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| {
        Some(acc.map_or(v, |a: f64| a.max(v)))
    })
}

fn fold_min(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| {
        Some(acc.map_or(v, |a: f64| a.min(v)))
    })
}

// ============================================================================
// DISTANCE
// ============================================================================

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two fixes, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 2, minute, 0).unwrap()
    }

    fn frame(hb_seq: i64, minute: u32, lat: f64, lon: f64, state: &str) -> TrajectoryFrame {
        TrajectoryFrame {
            hb_seq,
            ts_utc: ts(minute),
            received_at: ts(minute),
            payload: json!({
                "mid": "TR4-001",
                "hb_seq": hb_seq,
                "state": state,
                "position": {"lat": lat, "lon": lon},
                "environment": {"depth_m": 0.3}
            }),
        }
    }

    fn dive(id: i64, start_minute: u32, end_minute: u32) -> Dive {
        Dive {
            id,
            mid: "TR4-001".to_string(),
            cmd_seq: id,
            ok: Some(true),
            summary: Some(json!({"max_depth_m": 10.5, "duration_s": 300})),
            started_at: Some(ts(start_minute)),
            ended_at: Some(ts(end_minute)),
            created_at: ts(end_minute),
        }
    }

    fn count_type(fc: &FeatureCollection, t: &str) -> usize {
        fc.features
            .iter()
            .filter(|f| f.feature_type() == Some(t))
            .count()
    }

    #[test]
    fn straddled_dive_splits_surface_track() {
        // 20 frames, minutes 0..19; the dive covers minutes 8..=11.
        let mut frames: Vec<TrajectoryFrame> = (0..20)
            .map(|i| {
                frame(
                    i as i64 + 1,
                    i,
                    35.0 + i as f64 * 0.001,
                    139.0,
                    if (8..=11).contains(&i) { "AT_DEPTH" } else { "SURFACE_WAIT" },
                )
            })
            .collect();
        frames.reverse(); // builder must order by hb_seq itself

        let dives = vec![dive(1, 8, 11)];
        let fc = build_trajectory("TR4-001", &frames, &dives, &TrajectoryOptions::default());

        assert_eq!(count_type(&fc, "trajectory"), 2);
        assert_eq!(count_type(&fc, "dive"), 1);
        assert_eq!(count_type(&fc, "dive_marker"), 2);
        assert_eq!(count_type(&fc, "current"), 1);
        assert_eq!(count_type(&fc, "deployment"), 1);

        let current = fc
            .features
            .iter()
            .find(|f| f.feature_type() == Some("current"))
            .unwrap();
        let coords: Vec<f64> =
            serde_json::from_value(current.geometry.coordinates.clone()).unwrap();
        assert!((coords[0] - 139.0).abs() < 1e-9);
        assert!((coords[1] - 35.019).abs() < 1e-9);
    }

    #[test]
    fn invalid_and_sentinel_positions_are_dropped() {
        let mut frames = vec![
            frame(1, 0, 35.0, 139.0, "SURFACE_WAIT"),
            frame(2, 1, 0.0, 0.0, "SURFACE_WAIT"),
            frame(3, 2, 35.001, 139.0, "SURFACE_WAIT"),
        ];
        frames.push(TrajectoryFrame {
            hb_seq: 4,
            ts_utc: ts(3),
            received_at: ts(3),
            payload: json!({"state": "SURFACE_WAIT"}),
        });

        let fc = build_trajectory(
            "TR4-001",
            &frames,
            &[],
            &TrajectoryOptions {
                detailed: true,
                ..TrajectoryOptions::default()
            },
        );
        // One surface line from the two valid frames, one current point,
        // and one detail point per valid frame.
        assert_eq!(count_type(&fc, "trajectory"), 1);
        let details = fc
            .features
            .iter()
            .filter(|f| f.geometry.kind == "Point" && f.properties.contains_key("hb_seq"))
            .count();
        assert_eq!(details, 2);
    }

    #[test]
    fn one_frame_dive_window_merges_with_neighbor() {
        // Only minute 5 falls inside the dive window; that lone frame must
        // not become a 1-point segment.
        let frames: Vec<TrajectoryFrame> = (0..10)
            .map(|i| frame(i as i64 + 1, i, 35.0 + i as f64 * 0.001, 139.0, "SURFACE_WAIT"))
            .collect();
        let dives = vec![dive(1, 5, 5)];

        let fc = build_trajectory("TR4-001", &frames, &dives, &TrajectoryOptions::default());
        assert_eq!(count_type(&fc, "trajectory"), 1);
        // The dive still renders, from the frames bracketing its window.
        assert_eq!(count_type(&fc, "dive"), 1);
        assert_eq!(count_type(&fc, "dive_marker"), 2);
    }

    #[test]
    fn dive_window_back_computed_from_duration() {
        let frames: Vec<TrajectoryFrame> = (0..10)
            .map(|i| frame(i as i64 + 1, i, 35.0 + i as f64 * 0.001, 139.0, "SURFACE_WAIT"))
            .collect();
        let mut d = dive(1, 4, 8);
        d.started_at = None; // 240s duration puts the start back at minute 4
        d.summary = Some(json!({"max_depth_m": 10.5, "duration_s": 240}));

        let fc = build_trajectory("TR4-001", &frames, &[d], &TrajectoryOptions::default());
        assert_eq!(count_type(&fc, "dive"), 1);
    }

    #[test]
    fn clock_skew_prefers_receive_time() {
        let mut f = frame(1, 0, 35.0, 139.0, "SURFACE_WAIT");
        f.ts_utc = ts(0) + Duration::hours(6); // vehicle clock is off
        let frames = vec![f, frame(2, 1, 35.001, 139.0, "SURFACE_WAIT")];

        let fc = build_trajectory(
            "TR4-001",
            &frames,
            &[],
            &TrajectoryOptions {
                detailed: true,
                ..TrajectoryOptions::default()
            },
        );
        let skewed = fc
            .features
            .iter()
            .find(|f| f.properties.get("clock_skew") == Some(&Value::Bool(true)))
            .expect("skewed detail point");
        assert_eq!(
            skewed.properties.get("timestamp"),
            Some(&Value::from(ts(0).to_rfc3339()))
        );
    }

    #[test]
    fn statistics_aggregate_sensor_groups() {
        let frames: Vec<TrajectoryFrame> = (0..4)
            .map(|i| TrajectoryFrame {
                hb_seq: i as i64 + 1,
                ts_utc: ts(i),
                received_at: ts(i),
                payload: json!({
                    "state": "SURFACE_WAIT",
                    "position": {"lat": 35.0 + i as f64 * 0.001, "lon": 139.0},
                    "environment": {"depth_m": i as f64, "water_temp_c": 18.0},
                    "power": {"soc": 80.0 + i as f64},
                    "network": {"rsrp_dbm": -100.0 + i as f64}
                }),
            })
            .collect();
        let dives = vec![dive(1, 1, 2)];

        let fc = build_trajectory("TR4-001", &frames, &dives, &TrajectoryOptions::default());
        let stats = fc.statistics.expect("statistics attached");
        assert_eq!(stats.avg_depth_m, Some(1.5));
        // The dive summary's 10.5 m beats every heartbeat depth.
        assert_eq!(stats.max_depth_m, Some(10.5));
        assert_eq!(stats.avg_battery_soc, Some(81.5));
        assert_eq!(stats.min_rsrp_dbm, Some(-100.0));
        assert_eq!(stats.max_rsrp_dbm, Some(-97.0));
        assert_eq!(stats.avg_water_temp_c, Some(18.0));
    }

    #[test]
    fn statistics_empty_without_sensor_data() {
        let frames = vec![TrajectoryFrame {
            hb_seq: 1,
            ts_utc: ts(0),
            received_at: ts(0),
            payload: json!({"state": "SURFACE_WAIT", "position": {"lat": 35.0, "lon": 139.0}}),
        }];
        let fc = build_trajectory("TR4-001", &frames, &[], &TrajectoryOptions::default());
        let stats = fc.statistics.expect("statistics attached");
        assert_eq!(stats.avg_depth_m, None);
        assert_eq!(stats.avg_battery_soc, None);
        assert_eq!(stats.min_rsrp_dbm, None);
    }

    #[test]
    fn sampling_keeps_every_nth_frame() {
        let frames: Vec<TrajectoryFrame> = (0..10)
            .map(|i| frame(i as i64 + 1, i, 35.0 + i as f64 * 0.001, 139.0, "SURFACE_WAIT"))
            .collect();
        let fc = build_trajectory(
            "TR4-001",
            &frames,
            &[],
            &TrajectoryOptions {
                detailed: true,
                sampling: Some(2),
                ..TrajectoryOptions::default()
            },
        );
        let details = fc
            .features
            .iter()
            .filter(|f| f.geometry.kind == "Point" && f.properties.contains_key("hb_seq"))
            .count();
        assert_eq!(details, 5);
        // A sampling of 1 (or 0) is a no-op.
        let fc = build_trajectory(
            "TR4-001",
            &frames,
            &[],
            &TrajectoryOptions {
                detailed: true,
                sampling: Some(1),
                ..TrajectoryOptions::default()
            },
        );
        let details = fc
            .features
            .iter()
            .filter(|f| f.geometry.kind == "Point" && f.properties.contains_key("hb_seq"))
            .count();
        assert_eq!(details, 10);
    }

    #[test]
    fn deployment_point_marks_first_fix() {
        let frames: Vec<TrajectoryFrame> = (0..3)
            .map(|i| frame(i as i64 + 1, i, 35.0 + i as f64 * 0.001, 139.0, "SURFACE_WAIT"))
            .collect();
        let fc = build_trajectory("TR4-001", &frames, &[], &TrajectoryOptions::default());
        let deployment = fc
            .features
            .iter()
            .find(|f| f.feature_type() == Some("deployment"))
            .expect("deployment point");
        let coords: Vec<f64> =
            serde_json::from_value(deployment.geometry.coordinates.clone()).unwrap();
        assert!((coords[1] - 35.0).abs() < 1e-9);
        assert_eq!(
            deployment.properties.get("timestamp"),
            Some(&Value::from(ts(0).to_rfc3339()))
        );
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Tokyo Station to Shin-Osaka is roughly 400 km
        let d = haversine_m(35.681, 139.767, 34.733, 135.500);
        assert!((390_000.0..410_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn empty_input_yields_empty_collection() {
        let fc = build_trajectory("TR4-001", &[], &[], &TrajectoryOptions::default());
        assert!(fc.features.is_empty());
    }
}
