//! End-to-end pipeline tests.
//!
//! Drives the full engine — ingest, processing, fusion, preparation,
//! specialists, senior synthesis — against in-memory source documents and a
//! scripted LLM client, asserting the documented scenario outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use swellcast::config::ForecastConfig;
use swellcast::engine::{ForecastEngine, ForecastRequest};
use swellcast::error::EngineError;
use swellcast::llm::{LlmClient, LlmError, LlmRequest, LlmResponse, TokenUsage};
use swellcast::types::{parse_rfc3339, QualityFlag};

/// LLM client scripted with a fixed vision payload; plain narrative
/// otherwise.
struct ScriptedLlm {
    vision_payload: String,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate_text(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let text = if request.user_prompt.contains("Return ONLY valid JSON") {
            self.vision_payload.clone()
        } else {
            format!("Synthesized forecast narrative ({} chars of context).", request.user_prompt.len())
        };
        Ok(LlmResponse {
            text,
            usage: TokenUsage::default(),
        })
    }
}

fn now() -> DateTime<Utc> {
    parse_rfc3339("2025-10-07T12:00:00Z").unwrap()
}

/// NW storm payload: 985 mb low at 45N 160W with strong NNE fetch and a
/// high-confidence 13-15s swell prediction.
fn storm_payload(arrival: &str, confidence: f64) -> String {
    json!({
        "systems": [{
            "type": "low_pressure",
            "location": "45N 160W",
            "location_lat": 45.0,
            "location_lon": -160.0,
            "pressure_mb": 985,
            "wind_speed_kt": 50,
            "movement": "E at 25kt",
            "intensification": "steady",
            "generation_time": "2025-10-07T00:00:00Z",
            "fetch": {
                "direction": "NW",
                "distance_nm": 800,
                "duration_hrs": 36,
                "fetch_length_nm": 500,
                "quality": "strong"
            }
        }],
        "predicted_swells": [{
            "source_system": "low_45n_160w",
            "source_lat": 45.0,
            "source_lon": -160.0,
            "direction": "NW",
            "direction_degrees": 315,
            "arrival_time": arrival,
            "estimated_height": "7-9ft",
            "estimated_period": "13-15s",
            "confidence": confidence
        }],
        "frontal_boundaries": []
    })
    .to_string()
}

/// A buoy document with hourly observations ending at `now`, heights
/// oldest-first.
fn buoy_doc(id: &str, heights: &[f64], period: f64, direction: f64) -> Value {
    let observations: Vec<Value> = heights
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let ts = now() - Duration::hours((heights.len() - 1 - i) as i64);
            json!({
                "timestamp": ts.to_rfc3339(),
                "wave_height": h,
                "dominant_period": period,
                "wave_direction": direction,
                "wind_speed": 5.0,
                "wind_direction": 60.0
            })
        })
        .collect();
    json!({ "station_id": id, "name": format!("NDBC Buoy {id}"), "latitude": 21.67, "longitude": -158.12, "observations": observations })
}

/// A SWAN run peaking at `peak_hour` with the given peak height.
fn swan_doc(model: &str, peak_hour: i64, peak_height: f64, period: f64, direction: f64) -> Value {
    let shape = [0.4, 0.6, 1.0, 0.6, 0.4];
    let forecasts: Vec<Value> = shape
        .iter()
        .enumerate()
        .map(|(i, factor)| {
            let hour = peak_hour - 24 + (i as i64) * 12;
            json!({
                "hour": hour,
                "timestamp": (now() + Duration::hours(hour)).to_rfc3339(),
                "points": [{
                    "lat": 21.66, "lon": -158.05,
                    "hs": peak_height * factor, "tp": period, "dir": direction
                }]
            })
        })
        .collect();
    json!({
        "metadata": { "model": model, "region": "oahu", "run_time": now().to_rfc3339() },
        "forecasts": forecasts
    })
}

/// Build a chart bundle on disk: 4 pressure charts, 1 satellite frame,
/// 1 SST chart, 2 wave-model frames.
fn write_bundle(data_dir: &Path, bundle_id: &str) -> Vec<Value> {
    let bundle = data_dir.join(bundle_id);
    let charts = bundle.join("charts");
    std::fs::create_dir_all(&charts).unwrap();
    std::fs::create_dir_all(bundle.join("satellite/satellite")).unwrap();
    std::fs::create_dir_all(bundle.join("models")).unwrap();

    let mut metadata = Vec::new();
    let mut chart_feed = Vec::new();
    for i in 0..4 {
        let path = charts.join(format!("surface_{i}.png"));
        std::fs::write(&path, b"png").unwrap();
        metadata.push(json!({ "status": "success", "file_path": path.to_str().unwrap() }));
        chart_feed.push(json!({ "chart_type": "surface_pressure", "file_path": path.to_str().unwrap() }));
    }
    let sst = charts.join("sst_anomaly.png");
    std::fs::write(&sst, b"png").unwrap();
    metadata.push(json!({ "status": "success", "file_path": sst.to_str().unwrap() }));

    std::fs::write(charts.join("metadata.json"), json!(metadata).to_string()).unwrap();
    std::fs::write(bundle.join("satellite/satellite/goes_west.png"), b"png").unwrap();
    std::fs::write(bundle.join("models/ww3_surface_24.png"), b"png").unwrap();
    std::fs::write(bundle.join("models/ww3_surface_48.png"), b"png").unwrap();

    chart_feed
}

fn engine_with(data_dir: &Path, vision_payload: String) -> ForecastEngine {
    let mut config = ForecastConfig::default();
    config.paths.data_dir = data_dir.to_path_buf();
    ForecastEngine::new(
        config,
        Arc::new(ScriptedLlm { vision_payload }),
        None,
    )
}

fn request(bundle_id: Option<&str>, buoys: Vec<Value>, models: Vec<Value>, charts: Vec<Value>) -> ForecastRequest {
    let mut metadata = serde_json::Map::new();
    metadata.insert("forecast_id".into(), json!("test_forecast"));
    if let Some(id) = bundle_id {
        metadata.insert("bundle_id".into(), json!(id));
    }
    ForecastRequest::from_json(&json!({
        "metadata": metadata,
        "buoy_data": buoys,
        "model_data": models,
        "chart_data": charts,
    }))
    .unwrap()
}

#[tokio::test]
async fn happy_path_high_confidence_clean_north_shore() {
    let dir = tempfile::tempdir().unwrap();
    let charts = write_bundle(dir.path(), "b1");
    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));

    // Two model runs peaking >24h apart (no merge) plus three agreeing buoys
    let run = engine
        .run_at(
            request(
                Some("b1"),
                vec![
                    buoy_doc("51001", &[2.1, 2.2, 2.3], 12.0, 315.0),
                    buoy_doc("51101", &[2.2, 2.3, 2.4], 12.0, 318.0),
                    buoy_doc("51201", &[2.1, 2.2, 2.2], 12.0, 312.0),
                ],
                vec![
                    swan_doc("ww3", 36, 3.0, 14.0, 315.0),
                    swan_doc("swan-oahu", 84, 2.5, 13.0, 320.0),
                ],
                charts,
            ),
            now(),
        )
        .await
        .unwrap();

    // Fusion confidence: high category, score at or above 0.75
    let confidence = run.forecast.metadata.get("confidence").unwrap();
    let score = confidence.get("overall_score").and_then(Value::as_f64).unwrap();
    assert!(score >= 0.75, "expected high confidence, got {score}");
    assert_eq!(confidence.get("category").and_then(Value::as_str), Some("high"));
    assert!(confidence
        .get("warnings")
        .and_then(Value::as_array)
        .unwrap()
        .is_empty());

    // Both specialists ran and the senior synthesized
    assert!(run.buoy_analysis.is_some());
    let pressure = run.pressure_analysis.as_ref().unwrap();
    assert!(!run.narrative().is_empty());

    // Storm arrival physics: 45N 160W @ 14s → ~1414 nm, 66-67 h, Cg ≈ 21.2 kt
    let swell = &pressure.data.predicted_swells[0];
    let travel = swell.travel_time_hrs.unwrap();
    assert!((60.0..=72.0).contains(&travel), "travel {travel}h");
    assert!((swell.group_velocity_knots.unwrap() - 21.5).abs() < 1.0);
    let arrival = parse_rfc3339(swell.calculated_arrival.as_deref().unwrap()).unwrap();
    assert!(arrival >= parse_rfc3339("2025-10-09T12:00:00Z").unwrap());

    // North Shore: clean conditions with a sane size range
    let north = &run.synthesis.data.shore_forecasts["north_shore"];
    assert_eq!(north.conditions, "clean");
    let range = regex_captures(&north.size_range);
    assert!(range.0 >= 4 && range.1 > range.0, "got {}", north.size_range);

    // No excluded data anywhere in the synthesized inputs
    for event in &run.forecast.swell_events {
        assert_ne!(event.quality_flag, QualityFlag::Excluded);
    }
}

fn regex_captures(size: &str) -> (i64, i64) {
    let parts: Vec<i64> = size
        .trim_end_matches("ft")
        .split('-')
        .filter_map(|p| p.parse().ok())
        .collect();
    assert_eq!(parts.len(), 2, "size range format: {size}");
    (parts[0], parts[1])
}

#[tokio::test]
async fn phantom_swell_produces_no_event() {
    let dir = tempfile::tempdir().unwrap();
    let charts = write_bundle(dir.path(), "b2");
    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));

    // WVHT=1.2 with DPD=3.0: period is below the 4 s physical floor
    let phantom = json!({
        "station_id": "51099",
        "observations": [{ "Date": now().to_rfc3339(), "WVHT": "1.2", "DPD": "3.0" }]
    });

    let run = engine
        .run_at(
            request(
                Some("b2"),
                vec![phantom, buoy_doc("51001", &[2.0, 2.0, 2.0], 13.0, 315.0)],
                vec![],
                charts,
            ),
            now(),
        )
        .await
        .unwrap();

    assert!(
        !run.forecast
            .swell_events
            .iter()
            .any(|e| e.metadata.get("station_id") == Some(&json!("51099"))),
        "phantom-period buoy must not create a swell event"
    );
}

#[tokio::test]
async fn z_anomaly_outlier_excluded_consensus_unaffected() {
    let dir = tempfile::tempdir().unwrap();
    let charts = write_bundle(dir.path(), "b3");
    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));

    let models = vec![
        swan_doc("ww3", 36, 3.0, 14.0, 315.0),
        swan_doc("swan-oahu", 84, 2.5, 13.0, 320.0),
    ];
    let buoys = vec![
        buoy_doc("a", &[1.0, 1.0, 1.0, 1.0], 13.0, 315.0),
        buoy_doc("b", &[1.1, 1.1, 1.1, 1.1], 13.0, 315.0),
        buoy_doc("c", &[1.2, 1.2, 1.2, 1.2], 13.0, 315.0),
        buoy_doc("d", &[1.0, 1.0, 1.0, 1.0], 13.0, 315.0),
        buoy_doc("e", &[1.0, 1.0, 1.0, 8.0], 13.0, 315.0),
    ];

    let run = engine
        .run_at(request(Some("b3"), buoys, models.clone(), charts.clone()), now())
        .await
        .unwrap();

    assert!(
        !run.forecast
            .swell_events
            .iter()
            .any(|e| e.metadata.get("station_id") == Some(&json!("e"))),
        "8 m outlier among 1 m buoys must be excluded"
    );

    // Model consensus is independent of the buoy anomaly
    let with_outlier = run
        .forecast
        .metadata
        .get("confidence_report")
        .and_then(|r| r.get("factors"))
        .and_then(|f| f.get("model_consensus"))
        .and_then(Value::as_f64)
        .unwrap();

    let clean_run = engine
        .run_at(
            request(
                Some("b3"),
                vec![
                    buoy_doc("a", &[1.0, 1.0, 1.0, 1.0], 13.0, 315.0),
                    buoy_doc("b", &[1.1, 1.1, 1.1, 1.1], 13.0, 315.0),
                    buoy_doc("c", &[1.2, 1.2, 1.2, 1.2], 13.0, 315.0),
                    buoy_doc("d", &[1.0, 1.0, 1.0, 1.0], 13.0, 315.0),
                ],
                models,
                charts,
            ),
            now(),
        )
        .await
        .unwrap();
    let without_outlier = clean_run
        .forecast
        .metadata
        .get("confidence_report")
        .and_then(|r| r.get("factors"))
        .and_then(|f| f.get("model_consensus"))
        .and_then(Value::as_f64)
        .unwrap();

    assert!((with_outlier - without_outlier).abs() < 1e-9);
}

#[tokio::test]
async fn missing_feeds_enumerated_in_warnings() {
    let dir = tempfile::tempdir().unwrap();

    // A bundle with pressure charts only: no satellite frame, and the
    // chart_data feed itself is absent from the request.
    let bundle = dir.path().join("b4");
    let charts_dir = bundle.join("charts");
    std::fs::create_dir_all(&charts_dir).unwrap();
    let mut chart_meta = Vec::new();
    for i in 0..4 {
        let path = charts_dir.join(format!("surface_{i}.png"));
        std::fs::write(&path, b"png").unwrap();
        chart_meta.push(json!({ "status": "success", "file_path": path.to_str().unwrap() }));
    }
    std::fs::write(charts_dir.join("metadata.json"), json!(chart_meta).to_string()).unwrap();

    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));
    let run = engine
        .run_at(
            request(
                Some("b4"),
                vec![buoy_doc("51001", &[2.0, 2.0, 2.0], 13.0, 315.0)],
                vec![],
                vec![],
            ),
            now(),
        )
        .await
        .unwrap();

    let warnings: Vec<String> = run
        .forecast
        .metadata
        .get("confidence")
        .and_then(|c| c.get("warnings"))
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .filter_map(|w| w.as_str().map(str::to_string))
        .collect();

    assert!(warnings.iter().any(|w| w == "limited data"), "{warnings:?}");
    assert!(
        warnings
            .iter()
            .any(|w| w.starts_with("missing feeds:")
                && w.contains("models")
                && w.contains("charts")
                && w.contains("satellite")),
        "{warnings:?}"
    );
}

#[tokio::test]
async fn contradiction_detected_and_confidence_reduced() {
    let dir = tempfile::tempdir().unwrap();
    let charts = write_bundle(dir.path(), "b5");
    // High-confidence NW swell arriving six hours out
    let engine = engine_with(dir.path(), storm_payload("2025-10-07T18:00:00Z", 0.85));

    // Decreasing NW buoys
    let fading = vec![
        buoy_doc("51001", &[3.0, 2.6, 2.2, 1.8], 14.0, 315.0),
        buoy_doc("51101", &[2.9, 2.5, 2.1, 1.7], 14.0, 318.0),
    ];
    let run = engine
        .run_at(request(Some("b5"), fading, vec![], charts.clone()), now())
        .await
        .unwrap();

    let contradictions = &run.synthesis.data.synthesis.contradictions;
    assert!(
        contradictions
            .iter()
            .any(|c| format!("{:?}", c.impact).eq_ignore_ascii_case("medium")
                && c.resolution.contains("fades before")),
        "expected a medium fade-then-rebuild contradiction, got {contradictions:?}"
    );

    // Same setup with building buoys agrees; the fading case must cost at
    // least 0.05 confidence
    let building = vec![
        buoy_doc("51001", &[1.8, 2.2, 2.6, 3.0], 14.0, 315.0),
        buoy_doc("51101", &[1.7, 2.1, 2.5, 2.9], 14.0, 318.0),
    ];
    let engine2 = engine_with(dir.path(), storm_payload("2025-10-07T18:00:00Z", 0.85));
    let baseline = engine2
        .run_at(request(Some("b5"), building, vec![], charts), now())
        .await
        .unwrap();

    assert!(
        run.synthesis.confidence <= baseline.synthesis.confidence - 0.05,
        "contradiction must reduce confidence by at least 0.05: {} vs {}",
        run.synthesis.confidence,
        baseline.synthesis.confidence
    );
}

#[tokio::test]
async fn specialist_shortage_fails_request() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));

    // No bundle → no chart images → the pressure analyst cannot run; one
    // surviving specialist is below the minimum of two.
    let err = engine
        .run_at(
            request(None, vec![buoy_doc("51001", &[2.0, 2.1, 2.2], 13.0, 315.0)], vec![], vec![]),
            now(),
        )
        .await
        .unwrap_err();

    match err {
        EngineError::InsufficientSpecialists { required, available } => {
            assert_eq!(required, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientSpecialists, got {other}"),
    }
    // Non-zero exit for the driver
    assert_eq!(
        EngineError::InsufficientSpecialists { required: 2, available: 1 }.exit_code(),
        2
    );
}

#[tokio::test]
async fn request_without_metadata_section_aborts() {
    let err = ForecastRequest::from_json(&json!({ "buoy_data": [] })).unwrap_err();
    assert!(err.to_string().contains("metadata"));
}

#[tokio::test]
async fn stale_buoy_survives_as_suspect() {
    let dir = tempfile::tempdir().unwrap();
    let charts = write_bundle(dir.path(), "b7");
    let engine = engine_with(dir.path(), storm_payload("2025-10-09T12:00:00Z", 0.8));

    // Observations 30 h old: too stale to trust as current conditions but
    // still carrying signal
    let mut stale = buoy_doc("51001", &[2.0, 2.1, 2.2], 13.0, 315.0);
    for obs in stale["observations"].as_array_mut().unwrap() {
        let ts = parse_rfc3339(obs["timestamp"].as_str().unwrap()).unwrap() - Duration::hours(30);
        obs["timestamp"] = json!(ts.to_rfc3339());
    }

    let run = engine
        .run_at(request(Some("b7"), vec![stale], vec![], charts), now())
        .await
        .unwrap();

    let event = run
        .forecast
        .swell_events
        .iter()
        .find(|e| e.metadata.get("station_id") == Some(&json!("51001")))
        .expect("stale buoy should still produce an event");
    assert_eq!(event.quality_flag, QualityFlag::Suspect);
}
