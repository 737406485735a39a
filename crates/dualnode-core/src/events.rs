//! Real-time event bus for viewer synchronization.
//!
//! Registry, telemetry, and command-relay changes are published as typed
//! events on a broadcast channel and fanned out to every connected viewer.
//! Delivery is at-most-once per currently-connected subscriber: there is no
//! buffering or replay for absent subscribers, who instead receive a full
//! [`StationEvent::StationsList`] snapshot when they (re)connect.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{SensorReading, Station, TelemetryStats};

/// Default channel capacity for the event bus.
///
/// Determines how many events are buffered for slow subscribers before
/// they start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// An event on the real-time stream.
///
/// Serialized with an `event` tag and a `data` payload so the wire format
/// matches the viewer contract, e.g.
/// `{"event":"station-removed","data":{"mac":"A1B2C3"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum StationEvent {
    /// Full registry snapshot, sent to each new subscriber.
    #[serde(rename = "stations-list")]
    StationsList {
        /// All currently registered stations, in insertion order.
        stations: Vec<Station>,
    },

    /// A station registered or came back online.
    #[serde(rename = "station-online")]
    StationOnline {
        /// The station record.
        station: Station,
    },

    /// A station missed its heartbeat window. Edge-triggered.
    #[serde(rename = "station-offline")]
    StationOffline {
        /// Station identifier.
        mac: String,
        /// The station record at the time of the transition.
        station: Station,
    },

    /// A station was evicted or removed after a reset.
    #[serde(rename = "station-removed")]
    StationRemoved {
        /// Station identifier.
        mac: String,
    },

    /// A sensor station reported a reading.
    #[serde(rename = "sensor-update")]
    SensorUpdate {
        /// Station identifier.
        mac: String,
        /// Temperature in degrees Celsius.
        temp: f64,
        /// Relative humidity in percent.
        hum: f64,
        /// Distance in centimeters.
        dist: f64,
        /// Statistics over the retained window.
        stats: TelemetryStats,
    },

    /// Generated code was executed on a station.
    #[serde(rename = "led-executed")]
    LedExecuted {
        /// Station identifier.
        #[serde(rename = "stationMAC")]
        station_mac: String,
        /// Identifier of the executed command.
        #[serde(rename = "commandId")]
        command_id: uuid::Uuid,
        /// Device-reported execution result.
        result: serde_json::Value,
    },

    /// A station's current execution was stopped.
    #[serde(rename = "led-stopped")]
    LedStopped {
        /// Station identifier.
        #[serde(rename = "stationMAC")]
        station_mac: String,
    },

    /// Per-station liveness results after an explicit ping sweep.
    #[serde(rename = "stations-status")]
    StationsStatus {
        /// All stations with refreshed statuses.
        stations: Vec<Station>,
    },
}

impl StationEvent {
    /// Build a sensor-update event from a reading and its stats.
    #[must_use]
    pub fn sensor_update(mac: impl Into<String>, reading: &SensorReading, stats: TelemetryStats) -> Self {
        Self::SensorUpdate {
            mac: mac.into(),
            temp: reading.temp,
            hum: reading.hum,
            dist: reading.dist,
            stats,
        }
    }

    /// Wire name of this event kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StationsList { .. } => "stations-list",
            Self::StationOnline { .. } => "station-online",
            Self::StationOffline { .. } => "station-offline",
            Self::StationRemoved { .. } => "station-removed",
            Self::SensorUpdate { .. } => "sensor-update",
            Self::LedExecuted { .. } => "led-executed",
            Self::LedStopped { .. } => "led-stopped",
            Self::StationsStatus { .. } => "stations-status",
        }
    }
}

/// Publish/subscribe fan-out of [`StationEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StationEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published while no subscriber is connected are discarded.
    /// Returns `true` if at least one subscriber received the event.
    pub fn publish(&self, event: StationEvent) -> bool {
        let delivered = self.tx.send(event.clone()).is_ok();
        tracing::debug!(kind = event.kind(), delivered, "event published");
        delivered
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of current subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver half of the event bus.
pub struct EventReceiver {
    rx: broadcast::Receiver<StationEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// A lagged subscriber skips the dropped events and keeps receiving;
    /// returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<StationEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<StationEvent> {
        self.rx.try_recv().ok()
    }
}
