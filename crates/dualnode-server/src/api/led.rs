//! LED command API endpoints.
//!
//! Code generation delegates to the external collaborator; dispatch and
//! stop go to the actuator station through the command relay. Wire field
//! names (`stationMAC`, `commandId`) follow the viewer contract.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use dualnode_core::types::{Command, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for code generation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"prompt": "light the green LEDs", "stationMAC": "A1B2C3"}))]
pub struct GenerateCodeRequest {
    /// Natural-language description of the desired effect.
    #[schema(example = "light the green LEDs")]
    pub prompt: String,

    /// Target actuator station identifier.
    #[serde(rename = "stationMAC")]
    #[schema(example = "A1B2C3")]
    pub station_mac: String,
}

/// Response with generated code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateCodeResponse {
    /// Whether generation succeeded.
    #[schema(example = true)]
    pub success: bool,

    /// Generated source text.
    pub code: String,

    /// The recorded command, status `generated`.
    pub command: Command,
}

/// Request body for code dispatch.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExecuteCodeRequest {
    /// Target station identifier.
    #[serde(rename = "stationMAC")]
    pub station_mac: String,

    /// Code to execute.
    pub code: String,

    /// Identifier of the command being executed.
    #[serde(rename = "commandId")]
    pub command_id: Uuid,
}

/// Response after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteCodeResponse {
    /// Whether the station acknowledged execution.
    #[schema(example = true)]
    pub success: bool,

    /// Device-reported execution result.
    pub result: serde_json::Value,
}

/// Request body for stopping execution.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StopExecutionRequest {
    /// Target station identifier.
    #[serde(rename = "stationMAC")]
    pub station_mac: String,
}

/// Response after a stop signal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StopExecutionResponse {
    /// Always `true`; the dark-LED state is assumed optimistically.
    #[schema(example = true)]
    pub success: bool,
}

/// Command history response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandHistoryResponse {
    /// Commands for the station, newest first.
    pub history: Vec<Command>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Generate device code from a prompt.
///
/// Requires the target to be a registered actuator station. The generated
/// command enters the station's history with status `generated`.
#[utoipa::path(
    post,
    path = "/ai/generate-led-code",
    tag = "led",
    operation_id = "generateLedCode",
    summary = "Generate LED code from a natural-language prompt",
    request_body = GenerateCodeRequest,
    responses(
        (status = 200, description = "Code generated", body = GenerateCodeResponse),
        (status = 400, description = "Missing prompt or station identifier"),
        (status = 404, description = "Actuator station not found"),
        (status = 500, description = "Collaborator failure")
    )
)]
pub async fn generate_code(
    State(state): State<SharedState>,
    Json(request): Json<GenerateCodeRequest>,
) -> ApiResult<Json<GenerateCodeResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::missing_params("prompt"));
    }
    if request.station_mac.trim().is_empty() {
        return Err(ApiError::missing_params("stationMAC"));
    }

    // Only the actuator station accepts generated code.
    let station = state.registry.get(&request.station_mac).await;
    if !station.is_some_and(|s| s.station_type == StationType::ActuatorNode) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "STATION_NOT_FOUND",
            format!("No actuator station registered as '{}'", request.station_mac),
        ));
    }

    let code = state.generator.generate(&request.prompt).await?;
    let command = Command::generated(request.prompt, code.clone());
    state.commands.push(&request.station_mac, command.clone()).await;

    Ok(Json(GenerateCodeResponse {
        success: true,
        code,
        command,
    }))
}

/// Dispatch generated code to a station.
#[utoipa::path(
    post,
    path = "/led/execute",
    tag = "led",
    operation_id = "executeLedCode",
    summary = "Execute generated code on a station",
    request_body = ExecuteCodeRequest,
    responses(
        (status = 200, description = "Code executed", body = ExecuteCodeResponse),
        (status = 404, description = "Station not found"),
        (status = 500, description = "Station rejected the code or was unreachable"),
        (status = 504, description = "Station missed the dispatch deadline")
    )
)]
pub async fn execute_code(
    State(state): State<SharedState>,
    Json(request): Json<ExecuteCodeRequest>,
) -> ApiResult<Json<ExecuteCodeResponse>> {
    let result = state
        .relay
        .dispatch(&request.station_mac, &request.code, request.command_id)
        .await?;

    Ok(Json(ExecuteCodeResponse {
        success: true,
        result,
    }))
}

/// Stop a station's current execution.
#[utoipa::path(
    post,
    path = "/led/stop",
    tag = "led",
    operation_id = "stopLedExecution",
    summary = "Stop the current execution on a station",
    request_body = StopExecutionRequest,
    responses(
        (status = 200, description = "Stop signal sent", body = StopExecutionResponse),
        (status = 404, description = "Station not found")
    )
)]
pub async fn stop_execution(
    State(state): State<SharedState>,
    Json(request): Json<StopExecutionRequest>,
) -> ApiResult<Json<StopExecutionResponse>> {
    state.relay.stop(&request.station_mac).await?;
    Ok(Json(StopExecutionResponse { success: true }))
}

/// Fetch a station's command history.
#[utoipa::path(
    get,
    path = "/led/history/{mac}",
    tag = "led",
    operation_id = "commandHistory",
    summary = "Fetch command history for a station",
    params(
        ("mac" = String, Path, description = "Station identifier")
    ),
    responses(
        (status = 200, description = "Command history", body = CommandHistoryResponse)
    )
)]
pub async fn command_history(
    State(state): State<SharedState>,
    Path(mac): Path<String>,
) -> Json<CommandHistoryResponse> {
    Json(CommandHistoryResponse {
        history: state.commands.history(&mac).await,
    })
}
