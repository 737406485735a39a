//! Shared types and OpenAPI schemas.
//!
//! Domain types used across the registry, telemetry store, command relay,
//! and the HTTP API. Wire names follow the device firmware contract
//! (`sensor-node`/`actuator-node`, camelCase stats fields).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Station identifiers are the last six hex digits of the device MAC,
/// as advertised in the device name suffix (e.g. `DUALNODE_A1B2C3`).
static STATION_MAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{6}$").expect("static regex must compile"));

/// Returns `true` if `mac` is a valid station identifier.
#[must_use]
pub fn is_valid_station_mac(mac: &str) -> bool {
    STATION_MAC_RE.is_match(mac)
}

/// Capability type of a provisioned station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum StationType {
    /// Environmental sensing station (temperature, humidity, distance).
    #[serde(rename = "sensor-node")]
    SensorNode,

    /// LED actuator station driven by generated code.
    #[serde(rename = "actuator-node")]
    ActuatorNode,
}

impl StationType {
    /// Parse a wire-format type string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidType`] for unknown type names.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "sensor-node" => Ok(Self::SensorNode),
            "actuator-node" => Ok(Self::ActuatorNode),
            other => Err(crate::CoreError::InvalidType(other.to_string())),
        }
    }

    /// Default display name for a station of this type.
    #[must_use]
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::SensorNode => "Sensor Station",
            Self::ActuatorNode => "LED Station",
        }
    }
}

impl std::fmt::Display for StationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SensorNode => write!(f, "sensor-node"),
            Self::ActuatorNode => write!(f, "actuator-node"),
        }
    }
}

/// Liveness status of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    /// The station reported within the offline threshold.
    Online,
    /// The station missed its heartbeat window.
    Offline,
    /// The station was told to reset and will be removed after a grace period.
    Resetting,
}

/// A provisioned field station.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac": "A1B2C3",
    "name": "Sensor Station",
    "type": "sensor-node",
    "addr": "192.168.1.54",
    "status": "online",
    "last_seen": "2025-01-15T03:30:00Z",
    "configured_at": "2025-01-15T03:12:00Z"
}))]
pub struct Station {
    /// Stable hardware identifier (last six MAC digits).
    #[schema(example = "A1B2C3")]
    pub mac: String,

    /// Display name.
    #[schema(example = "Sensor Station")]
    pub name: String,

    /// Capability type.
    #[serde(rename = "type")]
    pub station_type: StationType,

    /// Network address the station reported on registration.
    #[schema(example = "192.168.1.54")]
    pub addr: String,

    /// Current liveness status.
    pub status: StationStatus,

    /// Last heartbeat timestamp (UTC).
    pub last_seen: DateTime<Utc>,

    /// When the station registered (UTC).
    pub configured_at: DateTime<Utc>,
}

/// A single sensor report from a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"temp": 22.4, "hum": 41.0, "dist": 150.0, "timestamp": "2025-01-15T03:30:00Z"}))]
pub struct SensorReading {
    /// Temperature in degrees Celsius.
    pub temp: f64,

    /// Relative humidity in percent.
    pub hum: f64,

    /// Ultrasonic distance in centimeters.
    pub dist: f64,

    /// When the coordinator ingested the reading (UTC).
    pub timestamp: DateTime<Utc>,
}

/// Rolling statistics over the retained telemetry window.
///
/// Recomputed in full on every insert; the window is bounded so the
/// recompute cost is constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "tempMin": 21.0, "tempMax": 24.5, "tempAvg": 22.6,
    "humMin": 38.0, "humMax": 44.0, "humAvg": 40.9
}))]
#[serde(rename_all = "camelCase")]
pub struct TelemetryStats {
    /// Minimum temperature in the retained window.
    pub temp_min: f64,
    /// Maximum temperature in the retained window.
    pub temp_max: f64,
    /// Average temperature over the retained window.
    pub temp_avg: f64,
    /// Minimum humidity in the retained window.
    pub hum_min: f64,
    /// Maximum humidity in the retained window.
    pub hum_max: f64,
    /// Average humidity over the retained window.
    pub hum_avg: f64,
}

/// Telemetry state for one station: latest reading, bounded history, stats.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelemetryRecord {
    /// Most recent reading.
    pub current: SensorReading,

    /// Retained readings, newest first.
    pub history: Vec<SensorReading>,

    /// Statistics over `history`.
    pub stats: TelemetryStats,
}

/// Execution status of a generated-code command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Code was generated but not yet dispatched.
    Generated,
    /// The station acknowledged execution.
    Executed,
    /// Dispatch failed; see the command's error text.
    Error,
}

/// A generated-code command in a station's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "8f14e45f-ceea-4672-a0f8-6f0c44b8a0d3",
    "prompt": "light the green LEDs",
    "code": "gpio_set_level(4, 1);",
    "status": "generated",
    "created_at": "2025-01-15T03:30:00Z",
    "executed_at": null,
    "error": null
}))]
pub struct Command {
    /// Command identifier.
    pub id: Uuid,

    /// Natural-language prompt the code was generated from.
    pub prompt: String,

    /// Generated source text.
    pub code: String,

    /// Execution status.
    pub status: CommandStatus,

    /// When the command was generated (UTC).
    pub created_at: DateTime<Utc>,

    /// When the station acknowledged execution, if it did.
    pub executed_at: Option<DateTime<Utc>>,

    /// Dispatch error text, if dispatch failed.
    pub error: Option<String>,
}

impl Command {
    /// Create a freshly generated command.
    #[must_use]
    pub fn generated(prompt: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            code: code.into(),
            status: CommandStatus::Generated,
            created_at: Utc::now(),
            executed_at: None,
            error: None,
        }
    }
}

/// Encryption kind of a Wi-Fi network reported during provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum WifiSecurity {
    /// No encryption.
    Open,
    /// WPA personal.
    Wpa,
    /// WPA2 personal.
    Wpa2,
    /// Mixed WPA/WPA2.
    WpaWpa2,
    /// WPA2 enterprise.
    Enterprise,
    /// WPA3.
    Wpa3,
    /// Unrecognized security code.
    Unknown,
}

impl WifiSecurity {
    /// Decode the device firmware's small-integer security code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Open,
            2 => Self::Wpa,
            3 => Self::Wpa2,
            4 => Self::WpaWpa2,
            5 => Self::Enterprise,
            7 => Self::Wpa3,
            _ => Self::Unknown,
        }
    }
}

/// A Wi-Fi network discovered by a device during provisioning.
///
/// Transient: held only for the lifetime of a provisioning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"ssid": "workshop", "rssi": -48, "security": "wpa2"}))]
pub struct WifiNetwork {
    /// Network SSID.
    pub ssid: String,

    /// Signal strength in dBm.
    pub rssi: i16,

    /// Encryption kind.
    pub security: WifiSecurity,
}
