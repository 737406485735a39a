//! OpenAPI specification generation for the coordinator API.
//!
//! The specification is served at `/api/openapi.json` and consumed by the
//! viewer front end for client generation.

use axum::Json;
use dualnode_core::types::{
    Command, CommandStatus, SensorReading, Station, StationStatus, StationType, TelemetryStats,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::led::{
    CommandHistoryResponse, ExecuteCodeRequest, ExecuteCodeResponse, GenerateCodeRequest,
    GenerateCodeResponse, StopExecutionRequest, StopExecutionResponse,
};
use super::sensors::{IngestReadingRequest, IngestReadingResponse, SensorHistoryResponse};
use super::stations::{
    RegisterStationRequest, RegisterStationResponse, ResetStationRequest, ResetStationResponse,
    StationsResponse,
};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Main OpenAPI document structure for the coordinator.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "dualnode coordinator API",
        version = "0.1.0",
        description = r#"
# dualnode coordinator

Always-on coordinator for a small fixed fleet of embedded field stations.

Stations register here after wireless provisioning, report telemetry,
receive generated code, and every registry or telemetry change is pushed
to connected viewers over the `/ws` event stream.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local coordinator")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "stations", description = "Station registry: listing, registration, reset"),
        (name = "sensors", description = "Telemetry ingestion and history"),
        (name = "led", description = "Code generation and dispatch to the actuator station")
    ),
    paths(
        super::health::health_check,
        super::stations::list_stations,
        super::stations::register_station,
        super::stations::reset_station,
        super::sensors::ingest_reading,
        super::sensors::sensor_history,
        super::led::generate_code,
        super::led::execute_code,
        super::led::stop_execution,
        super::led::command_history,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            Station,
            StationType,
            StationStatus,
            SensorReading,
            TelemetryStats,
            Command,
            CommandStatus,
            StationsResponse,
            RegisterStationRequest,
            RegisterStationResponse,
            ResetStationRequest,
            ResetStationResponse,
            IngestReadingRequest,
            IngestReadingResponse,
            SensorHistoryResponse,
            GenerateCodeRequest,
            GenerateCodeResponse,
            ExecuteCodeRequest,
            ExecuteCodeResponse,
            StopExecutionRequest,
            StopExecutionResponse,
            CommandHistoryResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "dualnode coordinator API");
        assert!(!spec.paths.paths.is_empty());
    }
}
