//! # dualnode-core
//!
//! Core coordinator logic for the dualnode field-station system.
//!
//! This crate provides:
//! - Station registry with capacity and per-type uniqueness enforcement
//! - Presence monitoring with edge-triggered offline detection
//! - Typed real-time event bus for viewer synchronization
//! - Bounded per-station telemetry storage with rolling statistics
//! - Command relay for dispatching generated code to stations
//! - Code-generation collaborator client
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`registry`] - Authoritative in-memory map of provisioned stations
//! - [`presence`] - Periodic liveness sweep over the registry
//! - [`events`] - Publish/subscribe channel for registry and telemetry changes
//! - [`telemetry`] - Bounded sensor-reading history with min/max/average stats
//! - [`commands`] - Per-station generated-code command history
//! - [`relay`] - Dispatch of generated code to a station's network address
//! - [`codegen`] - Prompt-to-code collaborator contract and HTTP client
//! - [`config`] - Coordinator configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod codegen;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod telemetry;
pub mod types;

// Re-export primary types for convenience
pub use codegen::{ChatCompletionsGenerator, CodeGenerator, LED_PIN_CONTEXT};
pub use commands::CommandLog;
pub use config::{Config, ConfigError};
pub use error::{CoreError, Result};
pub use events::{EventBus, EventReceiver, StationEvent};
pub use presence::PresenceMonitor;
pub use registry::StationRegistry;
pub use registry::NewStation;
pub use relay::{CommandRelay, HttpStationLink, LinkError, StationLink};
pub use telemetry::{ReportedReading, TelemetryStore};
pub use types::{
    is_valid_station_mac, Command, CommandStatus, SensorReading, Station, StationStatus,
    StationType, TelemetryRecord, TelemetryStats, WifiNetwork, WifiSecurity,
};
