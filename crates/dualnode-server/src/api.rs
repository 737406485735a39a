//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `stations` - Station registration, listing, and reset
//! - `sensors` - Telemetry ingestion and history
//! - `led` - Code generation, dispatch, stop, and command history
//! - `ws` - Real-time WebSocket event stream
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod led;
pub mod openapi;
pub mod sensors;
pub mod stations;
pub mod ws;

// Re-export commonly used types
#[allow(unused_imports)]
pub use error::{ApiError, ApiResult, ErrorResponse};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                      - Health check
/// /ws                          - Real-time event stream (WebSocket)
/// /api
/// ├── /stations                - Station list
/// ├── /config/station          - Station registration (device-side)
/// ├── /station/reset           - Device reset + scheduled removal
/// ├── /sensors/data            - Telemetry ingestion (device-side)
/// ├── /sensors/history/{mac}   - Telemetry history
/// ├── /ai/generate-led-code    - Prompt-to-code generation
/// ├── /led/execute             - Dispatch generated code
/// ├── /led/stop                - Stop current execution
/// ├── /led/history/{mac}       - Command history
/// └── /openapi.json            - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .route("/ws", get(ws::event_stream))
        .nest(
            "/api",
            Router::new()
                .route("/stations", get(stations::list_stations))
                .route("/config/station", post(stations::register_station))
                .route("/station/reset", post(stations::reset_station))
                .route("/sensors/data", post(sensors::ingest_reading))
                .route("/sensors/history/{mac}", get(sensors::sensor_history))
                .route("/ai/generate-led-code", post(led::generate_code))
                .route("/led/execute", post(led::execute_code))
                .route("/led/stop", post(led::stop_execution))
                .route("/led/history/{mac}", get(led::command_history))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
