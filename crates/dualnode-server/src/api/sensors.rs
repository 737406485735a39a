//! Sensor telemetry API endpoints.
//!
//! Ingestion doubles as the heartbeat: every accepted reading refreshes
//! the reporting station's liveness.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dualnode_core::types::{SensorReading, TelemetryStats};
use dualnode_core::ReportedReading;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a sensor reading.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"mac": "A1B2C3", "temp": 22.4, "hum": 41.0, "dist": 150.0}))]
pub struct IngestReadingRequest {
    /// Reporting station identifier.
    #[schema(example = "A1B2C3")]
    pub mac: String,

    /// Temperature in degrees Celsius.
    pub temp: f64,

    /// Relative humidity in percent.
    pub hum: f64,

    /// Ultrasonic distance in centimeters.
    pub dist: f64,
}

/// Response after a reading was ingested.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestReadingResponse {
    /// Whether the reading was stored.
    #[schema(example = true)]
    pub success: bool,

    /// Statistics over the retained window after this insert.
    pub stats: TelemetryStats,
}

/// Telemetry history response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SensorHistoryResponse {
    /// Most recent reading.
    pub current: SensorReading,

    /// Retained readings, newest first.
    pub history: Vec<SensorReading>,

    /// Statistics over the retained window.
    pub stats: TelemetryStats,
}

// ============================================================================
// Handlers
// ============================================================================

/// Ingest a sensor reading.
///
/// Applies the heartbeat and appends to the station's bounded history;
/// viewers receive the reading as a `sensor-update` event.
#[utoipa::path(
    post,
    path = "/sensors/data",
    tag = "sensors",
    operation_id = "ingestReading",
    summary = "Submit a sensor reading",
    request_body = IngestReadingRequest,
    responses(
        (status = 200, description = "Reading stored", body = IngestReadingResponse),
        (status = 404, description = "Station not registered")
    )
)]
pub async fn ingest_reading(
    State(state): State<SharedState>,
    Json(request): Json<IngestReadingRequest>,
) -> ApiResult<Json<IngestReadingResponse>> {
    let record = state
        .telemetry
        .ingest(
            &request.mac,
            ReportedReading {
                temp: request.temp,
                hum: request.hum,
                dist: request.dist,
            },
        )
        .await?;

    Ok(Json(IngestReadingResponse {
        success: true,
        stats: record.stats,
    }))
}

/// Fetch a station's telemetry history.
#[utoipa::path(
    get,
    path = "/sensors/history/{mac}",
    tag = "sensors",
    operation_id = "sensorHistory",
    summary = "Fetch telemetry history for a station",
    params(
        ("mac" = String, Path, description = "Station identifier")
    ),
    responses(
        (status = 200, description = "Telemetry history", body = SensorHistoryResponse),
        (status = 404, description = "No telemetry recorded for this station")
    )
)]
pub async fn sensor_history(
    State(state): State<SharedState>,
    Path(mac): Path<String>,
) -> ApiResult<Json<SensorHistoryResponse>> {
    let record = state.telemetry.record(&mac).await.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "STATION_NOT_FOUND",
            format!("No telemetry recorded for station '{mac}'"),
        )
    })?;

    Ok(Json(SensorHistoryResponse {
        current: record.current,
        history: record.history,
        stats: record.stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_request_deserialization() {
        let json = r#"{"mac":"A1B2C3","temp":22.4,"hum":41.0,"dist":150.0}"#;
        let request: IngestReadingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.mac, "A1B2C3");
        assert_eq!(request.temp, 22.4);
    }
}
