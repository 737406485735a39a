//! End-to-end API tests for the coordinator.
//!
//! The device link and code-generation collaborator are scripted so the
//! full request paths run without hardware or network access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use dualnode_core::codegen::CodeGenerator;
use dualnode_core::relay::{LinkError, StationLink};
use dualnode_core::{Config, CoreError, StationEvent};
use dualnode_server::api::create_router;
use dualnode_server::state::{AppState, SharedState};
use serde_json::{json, Value};

// ============================================================================
// Scripted collaborators
// ============================================================================

struct ScriptedLink {
    reachable: AtomicBool,
}

impl ScriptedLink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl StationLink for ScriptedLink {
    async fn execute(&self, _addr: &str, _code: &str) -> Result<Value, LinkError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(json!({"status": "ok"}))
        } else {
            Err(LinkError::Unreachable("connection refused".to_string()))
        }
    }

    async fn stop(&self, _addr: &str) -> Result<(), LinkError> {
        Ok(())
    }

    async fn reset(&self, _addr: &str) -> Result<(), LinkError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LinkError::Unreachable("connection refused".to_string()))
        }
    }

    async fn ping(&self, _addr: &str) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

struct ScriptedGenerator {
    fail: AtomicBool,
}

impl ScriptedGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CoreError::Ai("collaborator overloaded".to_string()))
        } else {
            Ok("gpio_set_level(4, 1);".to_string())
        }
    }
}

struct Harness {
    server: TestServer,
    state: SharedState,
    link: Arc<ScriptedLink>,
    generator: Arc<ScriptedGenerator>,
}

fn harness_with(config: Config) -> Harness {
    let link = ScriptedLink::new();
    let generator = ScriptedGenerator::new();
    let state = AppState::with_collaborators(
        config,
        Arc::clone(&link) as Arc<dyn StationLink>,
        Arc::clone(&generator) as Arc<dyn CodeGenerator>,
    );
    let server = TestServer::new(create_router(Arc::clone(&state))).expect("test server");
    Harness {
        server,
        state,
        link,
        generator,
    }
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn sensor_body(mac: &str) -> Value {
    json!({"mac": mac, "type": "sensor-node", "addr": "10.0.0.9"})
}

fn actuator_body(mac: &str) -> Value {
    json!({"mac": mac, "name": "LED Station", "type": "actuator-node", "addr": "10.0.0.10"})
}

// ============================================================================
// Stations
// ============================================================================

#[tokio::test]
async fn test_register_then_list() {
    let h = harness();

    let response = h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["station"]["mac"], "AA0001");
    assert_eq!(body["station"]["status"], "online");
    assert_eq!(body["station"]["name"], "Sensor Station");

    let response = h.server.get("/api/stations").await;
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["max_stations"], 2);
    assert_eq!(body["stations"][0]["mac"], "AA0001");
}

#[tokio::test]
async fn test_register_rejects_unknown_type() {
    let h = harness();
    let response = h
        .server
        .post("/api/config/station")
        .json(&json!({"mac": "AA0001", "type": "relay-node", "addr": "10.0.0.9"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_TYPE");
}

#[tokio::test]
async fn test_register_rejects_malformed_mac() {
    let h = harness();
    let response = h
        .server
        .post("/api/config/station")
        .json(&json!({"mac": "not-a-mac", "type": "sensor-node", "addr": "10.0.0.9"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "MISSING_PARAMS");
}

#[tokio::test]
async fn test_same_type_registration_evicts_with_ordered_events() {
    let h = harness();
    let mut rx = h.state.bus.subscribe();

    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    assert!(matches!(
        rx.recv().await.unwrap(),
        StationEvent::StationOnline { ref station } if station.mac == "AA0001"
    ));

    h.server.post("/api/config/station").json(&sensor_body("BB0002")).await;

    // Removal of the evicted holder precedes the replacement's online event.
    assert!(matches!(
        rx.recv().await.unwrap(),
        StationEvent::StationRemoved { ref mac } if mac == "AA0001"
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        StationEvent::StationOnline { ref station } if station.mac == "BB0002"
    ));

    let body: Value = h.server.get("/api/stations").await.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["stations"][0]["mac"], "BB0002");
}

#[tokio::test]
async fn test_capacity_rejection_keeps_existing_stations() {
    let mut config = Config::default();
    config.registry.max_stations = 1;
    let h = harness_with(config);

    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    let response = h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "CAPACITY_ERROR");

    let body: Value = h.server.get("/api/stations").await.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["stations"][0]["mac"], "AA0001");
}

#[tokio::test]
async fn test_reset_removes_station_after_grace() {
    let mut config = Config::default();
    config.registry.reset_grace_secs = 0;
    let h = harness_with(config);

    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    let response = h
        .server
        .post("/api/station/reset")
        .json(&json!({"mac": "AA0001"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Removal happens on a background task after the grace period.
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if h.state.registry.get("AA0001").await.is_none() {
            break;
        }
    }
    assert!(h.state.registry.get("AA0001").await.is_none());
}

#[tokio::test]
async fn test_reset_fails_when_device_unreachable() {
    let h = harness();
    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    h.link.reachable.store(false, Ordering::SeqCst);

    let response = h
        .server
        .post("/api/station/reset")
        .json(&json!({"mac": "AA0001"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "EXECUTION_ERROR");
    // The station stays registered.
    assert!(h.state.registry.get("AA0001").await.is_some());
}

// ============================================================================
// Sensors
// ============================================================================

#[tokio::test]
async fn test_ingest_requires_registration() {
    let h = harness();
    let reading = json!({"mac": "AA0001", "temp": 22.0, "hum": 40.0, "dist": 150.0});

    let response = h.server.post("/api/sensors/data").json(&reading).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "STATION_NOT_FOUND");

    // After registration the same reading is accepted.
    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    let response = h.server.post("/api/sensors/data").json(&reading).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["tempMin"], 22.0);
    assert_eq!(body["stats"]["tempMax"], 22.0);
    assert_eq!(body["stats"]["humMin"], 40.0);
    assert_eq!(body["stats"]["humMax"], 40.0);
}

#[tokio::test]
async fn test_sensor_history_endpoint() {
    let h = harness();
    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    for temp in [20.0, 21.0, 22.0] {
        h.server
            .post("/api/sensors/data")
            .json(&json!({"mac": "AA0001", "temp": temp, "hum": 40.0, "dist": 150.0}))
            .await;
    }

    let response = h.server.get("/api/sensors/history/AA0001").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["current"]["temp"], 22.0);
    assert_eq!(body["history"].as_array().unwrap().len(), 3);
    assert_eq!(body["history"][0]["temp"], 22.0);
    assert_eq!(body["stats"]["tempMin"], 20.0);
    assert_eq!(body["stats"]["tempMax"], 22.0);

    let response = h.server.get("/api/sensors/history/ZZ9999").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// ============================================================================
// LED commands
// ============================================================================

#[tokio::test]
async fn test_generate_requires_actuator_station() {
    let h = harness();
    let request = json!({"prompt": "light the green LEDs", "stationMAC": "AA0001"});

    // Unknown station.
    let response = h.server.post("/api/ai/generate-led-code").json(&request).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // A sensor station does not accept generated code either.
    h.server.post("/api/config/station").json(&sensor_body("AA0001")).await;
    let response = h.server.post("/api/ai/generate-led-code").json(&request).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_records_command() {
    let h = harness();
    h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;

    let response = h
        .server
        .post("/api/ai/generate-led-code")
        .json(&json!({"prompt": "light the green LEDs", "stationMAC": "BB0002"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "gpio_set_level(4, 1);");
    assert_eq!(body["command"]["status"], "generated");

    let history: Value = h.server.get("/api/led/history/BB0002").await.json();
    assert_eq!(history["history"].as_array().unwrap().len(), 1);
    assert_eq!(history["history"][0]["prompt"], "light the green LEDs");
}

#[tokio::test]
async fn test_generate_surfaces_collaborator_failure() {
    let h = harness();
    h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;
    h.generator.fail.store(true, Ordering::SeqCst);

    let response = h
        .server
        .post("/api/ai/generate-led-code")
        .json(&json!({"prompt": "light the green LEDs", "stationMAC": "BB0002"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "AI_ERROR");
}

#[tokio::test]
async fn test_generate_rejects_empty_prompt() {
    let h = harness();
    let response = h
        .server
        .post("/api/ai/generate-led-code")
        .json(&json!({"prompt": "  ", "stationMAC": "BB0002"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "MISSING_PARAMS");
}

#[tokio::test]
async fn test_execute_marks_command_and_reports_result() {
    let h = harness();
    h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;

    let generated: Value = h
        .server
        .post("/api/ai/generate-led-code")
        .json(&json!({"prompt": "wave", "stationMAC": "BB0002"}))
        .await
        .json();
    let command_id = generated["command"]["id"].as_str().unwrap().to_string();

    let response = h
        .server
        .post("/api/led/execute")
        .json(&json!({
            "stationMAC": "BB0002",
            "code": generated["code"],
            "commandId": command_id
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["result"]["status"], "ok");

    let history: Value = h.server.get("/api/led/history/BB0002").await.json();
    assert_eq!(history["history"][0]["status"], "executed");
}

#[tokio::test]
async fn test_execute_failure_marks_error() {
    let h = harness();
    h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;
    let generated: Value = h
        .server
        .post("/api/ai/generate-led-code")
        .json(&json!({"prompt": "wave", "stationMAC": "BB0002"}))
        .await
        .json();
    let command_id = generated["command"]["id"].as_str().unwrap().to_string();

    h.link.reachable.store(false, Ordering::SeqCst);
    let response = h
        .server
        .post("/api/led/execute")
        .json(&json!({
            "stationMAC": "BB0002",
            "code": generated["code"],
            "commandId": command_id
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "EXECUTION_ERROR");

    let history: Value = h.server.get("/api/led/history/BB0002").await.json();
    assert_eq!(history["history"][0]["status"], "error");
}

#[tokio::test]
async fn test_stop_is_optimistic() {
    let h = harness();
    h.server.post("/api/config/station").json(&actuator_body("BB0002")).await;
    let mut rx = h.state.bus.subscribe();

    let response = h
        .server
        .post("/api/led/stop")
        .json(&json!({"stationMAC": "BB0002"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(matches!(
        rx.recv().await.unwrap(),
        StationEvent::LedStopped { ref station_mac } if station_mac == "BB0002"
    ));
}

// ============================================================================
// System
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stations_registered"], 0);
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let h = harness();
    let response = h.server.get("/api/openapi.json").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "dualnode coordinator API");
}
