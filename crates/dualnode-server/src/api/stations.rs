//! Station API endpoints.
//!
//! Registration is called by the stations themselves right after they join
//! the network with the credentials transferred during provisioning; a
//! station is marked online the moment it registers, and the presence
//! monitor catches addresses that turn out to be unreachable.

use axum::extract::State;
use axum::Json;
use dualnode_core::types::{is_valid_station_mac, Station, StationType};
use dualnode_core::NewStation;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Station list response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "count": 1,
    "max_stations": 2,
    "stations": []
}))]
pub struct StationsResponse {
    /// Number of registered stations.
    #[schema(example = 1)]
    pub count: usize,

    /// Configured station capacity.
    #[schema(example = 2)]
    pub max_stations: usize,

    /// Registered stations in insertion order.
    pub stations: Vec<Station>,
}

/// Request body for station registration.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac": "A1B2C3",
    "name": "Sensor Station",
    "type": "sensor-node",
    "addr": "192.168.1.54"
}))]
pub struct RegisterStationRequest {
    /// Station identifier (last six MAC digits).
    #[schema(example = "A1B2C3")]
    pub mac: String,

    /// Optional display name; defaults per type.
    pub name: Option<String>,

    /// Station type: `sensor-node` or `actuator-node`.
    #[serde(rename = "type")]
    #[schema(example = "sensor-node")]
    pub station_type: String,

    /// Network address the station is reachable at.
    #[schema(example = "192.168.1.54")]
    pub addr: String,
}

/// Response after successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterStationResponse {
    /// Whether registration succeeded.
    #[schema(example = true)]
    pub success: bool,

    /// The registered station.
    pub station: Station,
}

/// Request body for a station reset.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"mac": "A1B2C3"}))]
pub struct ResetStationRequest {
    /// Station identifier.
    #[schema(example = "A1B2C3")]
    pub mac: String,
}

/// Response after a reset was triggered.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetStationResponse {
    /// Whether the reset was triggered.
    #[schema(example = true)]
    pub success: bool,

    /// Operator-facing status message.
    #[schema(example = "Station is resetting and will be removed")]
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all registered stations.
#[utoipa::path(
    get,
    path = "/stations",
    tag = "stations",
    operation_id = "listStations",
    summary = "List registered stations",
    responses(
        (status = 200, description = "Station list", body = StationsResponse)
    )
)]
pub async fn list_stations(State(state): State<SharedState>) -> Json<StationsResponse> {
    let stations = state.registry.list().await;
    Json(StationsResponse {
        count: stations.len(),
        max_stations: state.registry.max_stations(),
        stations,
    })
}

/// Register a station.
///
/// Called by a station once it joins the network. Applies the capacity and
/// per-type uniqueness rules: a type collision evicts the prior holder.
#[utoipa::path(
    post,
    path = "/config/station",
    tag = "stations",
    operation_id = "registerStation",
    summary = "Register a provisioned station",
    request_body = RegisterStationRequest,
    responses(
        (status = 200, description = "Station registered", body = RegisterStationResponse),
        (status = 400, description = "Invalid type, capacity reached, or missing parameters")
    )
)]
pub async fn register_station(
    State(state): State<SharedState>,
    Json(request): Json<RegisterStationRequest>,
) -> ApiResult<Json<RegisterStationResponse>> {
    if !is_valid_station_mac(&request.mac) {
        return Err(ApiError::missing_params("mac"));
    }
    if request.addr.trim().is_empty() {
        return Err(ApiError::missing_params("addr"));
    }
    let station_type = StationType::parse(&request.station_type)?;

    let station = state
        .registry
        .register(NewStation {
            mac: request.mac,
            name: request.name,
            station_type,
            addr: request.addr,
        })
        .await?;

    Ok(Json(RegisterStationResponse {
        success: true,
        station,
    }))
}

/// Reset a station.
///
/// Triggers the device-side reset, marks the station `resetting`, and
/// schedules its removal after the configured grace period.
#[utoipa::path(
    post,
    path = "/station/reset",
    tag = "stations",
    operation_id = "resetStation",
    summary = "Reset a station and schedule its removal",
    request_body = ResetStationRequest,
    responses(
        (status = 200, description = "Reset triggered", body = ResetStationResponse),
        (status = 404, description = "Station not found"),
        (status = 500, description = "Device rejected the reset")
    )
)]
pub async fn reset_station(
    State(state): State<SharedState>,
    Json(request): Json<ResetStationRequest>,
) -> ApiResult<Json<ResetStationResponse>> {
    state.relay.reset(&request.mac).await?;
    Ok(Json(ResetStationResponse {
        success: true,
        message: "Station is resetting and will be removed".to_string(),
    }))
}
