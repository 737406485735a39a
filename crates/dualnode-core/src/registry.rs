//! Authoritative in-memory station registry.
//!
//! The registry is the single owner of all [`Station`] records. It enforces
//! two invariants on registration:
//!
//! - at most `max_stations` stations are held at once
//! - at most one station exists per [`StationType`]; registering a station
//!   whose type is already held under a different identifier atomically
//!   evicts the prior holder (removal event precedes the online event)
//!
//! All mutations complete within a single write-lock hold and never span an
//! await point, so no two mutations can interleave and no event can be
//! observed out of order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::error::{CoreError, Result};
use crate::events::{EventBus, StationEvent};
use crate::types::{Station, StationStatus, StationType};

/// Registration request for a station announcing itself.
#[derive(Debug, Clone)]
pub struct NewStation {
    /// Stable hardware identifier.
    pub mac: String,
    /// Optional display name; defaults per type.
    pub name: Option<String>,
    /// Capability type.
    pub station_type: StationType,
    /// Network address the station is reachable at.
    pub addr: String,
}

/// In-memory registry of provisioned stations.
///
/// Insertion order is preserved for [`StationRegistry::list`]; it is not
/// stable across evictions.
pub struct StationRegistry {
    stations: RwLock<Vec<Station>>,
    max_stations: usize,
    bus: EventBus,
}

impl StationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: &RegistryConfig, bus: EventBus) -> Self {
        Self {
            stations: RwLock::new(Vec::new()),
            max_stations: config.max_stations,
            bus,
        }
    }

    /// Maximum number of stations this registry will hold.
    #[must_use]
    pub const fn max_stations(&self) -> usize {
        self.max_stations
    }

    /// Register a station, applying eviction and capacity rules.
    ///
    /// A station re-announcing under a known identifier is updated in
    /// place. A type collision under a different identifier evicts the
    /// prior holder before the insert; the eviction's `station-removed`
    /// event is published before the new station's `station-online`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CapacityExceeded`] when a genuinely new
    /// station would exceed capacity; existing stations are untouched.
    pub async fn register(&self, new: NewStation) -> Result<Station> {
        let mut stations = self.stations.write().await;

        let same_type_other_mac = stations
            .iter()
            .position(|s| s.station_type == new.station_type && s.mac != new.mac);
        let known_mac = stations.iter().any(|s| s.mac == new.mac);

        // A new identifier that evicts nothing needs a free slot.
        if !known_mac && same_type_other_mac.is_none() && stations.len() >= self.max_stations {
            return Err(CoreError::CapacityExceeded {
                max: self.max_stations,
            });
        }

        if let Some(idx) = same_type_other_mac {
            let evicted = stations.remove(idx);
            warn!(
                evicted = %evicted.mac,
                replacement = %new.mac,
                station_type = %evicted.station_type,
                "evicting station: type already held"
            );
            self.bus.publish(StationEvent::StationRemoved { mac: evicted.mac });
        }

        let now = Utc::now();
        let station = Station {
            mac: new.mac,
            name: new
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| new.station_type.default_name().to_string()),
            station_type: new.station_type,
            addr: new.addr,
            status: StationStatus::Online,
            last_seen: now,
            configured_at: now,
        };

        if let Some(existing) = stations.iter_mut().find(|s| s.mac == station.mac) {
            *existing = station.clone();
        } else {
            stations.push(station.clone());
        }

        info!(mac = %station.mac, addr = %station.addr, station_type = %station.station_type, "station registered");
        self.bus.publish(StationEvent::StationOnline {
            station: station.clone(),
        });

        Ok(station)
    }

    /// Look up a station by identifier.
    pub async fn get(&self, mac: &str) -> Option<Station> {
        self.stations.read().await.iter().find(|s| s.mac == mac).cloned()
    }

    /// All registered stations in insertion order.
    pub async fn list(&self) -> Vec<Station> {
        self.stations.read().await.clone()
    }

    /// Number of registered stations.
    pub async fn count(&self) -> usize {
        self.stations.read().await.len()
    }

    /// Remove a station and publish `station-removed`.
    ///
    /// Returns the removed record, or `None` if the identifier was unknown.
    pub async fn remove(&self, mac: &str) -> Option<Station> {
        let mut stations = self.stations.write().await;
        let idx = stations.iter().position(|s| s.mac == mac)?;
        let removed = stations.remove(idx);
        info!(mac = %removed.mac, "station removed");
        self.bus.publish(StationEvent::StationRemoved {
            mac: removed.mac.clone(),
        });
        Some(removed)
    }

    /// Record a heartbeat: refresh `last_seen` and force status online.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StationNotFound`] for unknown identifiers.
    pub async fn touch(&self, mac: &str) -> Result<()> {
        let mut stations = self.stations.write().await;
        let station = stations
            .iter_mut()
            .find(|s| s.mac == mac)
            .ok_or_else(|| CoreError::StationNotFound(mac.to_string()))?;
        station.last_seen = Utc::now();
        station.status = StationStatus::Online;
        Ok(())
    }

    /// Mark a station as resetting ahead of its scheduled removal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StationNotFound`] for unknown identifiers.
    pub async fn mark_resetting(&self, mac: &str) -> Result<Station> {
        let mut stations = self.stations.write().await;
        let station = stations
            .iter_mut()
            .find(|s| s.mac == mac)
            .ok_or_else(|| CoreError::StationNotFound(mac.to_string()))?;
        station.status = StationStatus::Resetting;
        Ok(station.clone())
    }

    /// Apply an explicit liveness probe result.
    ///
    /// A reachable station gets the usual heartbeat treatment. An
    /// unreachable one transitions online → offline and publishes a single
    /// `station-offline` event; stations already offline stay silent.
    pub async fn apply_ping(&self, mac: &str, reachable: bool) {
        let mut stations = self.stations.write().await;
        let Some(station) = stations.iter_mut().find(|s| s.mac == mac) else {
            return;
        };
        if reachable {
            station.last_seen = Utc::now();
            station.status = StationStatus::Online;
        } else if station.status == StationStatus::Online {
            station.status = StationStatus::Offline;
            let snapshot = station.clone();
            warn!(mac = %snapshot.mac, "station unreachable on ping");
            self.bus.publish(StationEvent::StationOffline {
                mac: snapshot.mac.clone(),
                station: snapshot,
            });
        }
    }

    /// Presence sweep: transition stale online stations to offline.
    ///
    /// A station is stale when `now - last_seen` exceeds `threshold`. The
    /// transition is edge-triggered: exactly one `station-offline` event
    /// per transition, none on repeated sweeps while still offline.
    /// Returns the stations that transitioned.
    pub async fn sweep_at(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<Station> {
        let threshold =
            chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::seconds(10));
        let mut transitioned = Vec::new();
        let mut stations = self.stations.write().await;
        for station in stations.iter_mut() {
            if station.status == StationStatus::Online && now - station.last_seen > threshold {
                station.status = StationStatus::Offline;
                let snapshot = station.clone();
                warn!(mac = %snapshot.mac, "station offline: heartbeat timeout");
                self.bus.publish(StationEvent::StationOffline {
                    mac: snapshot.mac.clone(),
                    station: snapshot.clone(),
                });
                transitioned.push(snapshot);
            }
        }
        transitioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (StationRegistry, crate::events::EventReceiver) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let reg = StationRegistry::new(&RegistryConfig::default(), bus);
        (reg, rx)
    }

    fn sensor(mac: &str) -> NewStation {
        NewStation {
            mac: mac.to_string(),
            name: None,
            station_type: StationType::SensorNode,
            addr: "10.0.0.9".to_string(),
        }
    }

    fn actuator(mac: &str) -> NewStation {
        NewStation {
            mac: mac.to_string(),
            name: Some("LED Station".to_string()),
            station_type: StationType::ActuatorNode,
            addr: "10.0.0.10".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let (reg, _rx) = registry();
        let station = reg.register(sensor("AA0001")).await.unwrap();
        assert_eq!(station.status, StationStatus::Online);
        assert_eq!(station.name, "Sensor Station");

        let fetched = reg.get("AA0001").await.unwrap();
        assert_eq!(fetched.mac, "AA0001");
        assert!(reg.get("ZZ9999").await.is_none());
    }

    #[tokio::test]
    async fn test_same_type_registration_evicts_prior_holder() {
        let (reg, mut rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let _ = rx.recv().await; // station-online AA0001

        reg.register(sensor("BB0002")).await.unwrap();

        // Exactly one removal event, before the addition event.
        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            StationEvent::StationRemoved { ref mac } if mac == "AA0001"
        ));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            StationEvent::StationOnline { ref station } if station.mac == "BB0002"
        ));

        let listed = reg.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mac, "BB0002");
    }

    #[tokio::test]
    async fn test_capacity_rejection_leaves_registry_untouched() {
        let bus = EventBus::new();
        let config = RegistryConfig {
            max_stations: 1,
            ..RegistryConfig::default()
        };
        let reg = StationRegistry::new(&config, bus);

        reg.register(sensor("AA0001")).await.unwrap();
        let err = reg.register(actuator("BB0002")).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { max: 1 }));

        let listed = reg.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mac, "AA0001");
    }

    #[tokio::test]
    async fn test_type_collision_evicts_even_at_capacity() {
        let (reg, _rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        reg.register(actuator("BB0002")).await.unwrap();

        // Full registry, but CC0003 collides with the sensor slot.
        reg.register(sensor("CC0003")).await.unwrap();
        let macs: Vec<_> = reg.list().await.into_iter().map(|s| s.mac).collect();
        assert_eq!(macs, vec!["BB0002", "CC0003"]);
    }

    #[tokio::test]
    async fn test_reannouncement_updates_in_place() {
        let (reg, _rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();

        let mut again = sensor("AA0001");
        again.addr = "10.0.0.77".to_string();
        reg.register(again).await.unwrap();

        let listed = reg.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].addr, "10.0.0.77");
    }

    #[tokio::test]
    async fn test_touch_refreshes_and_forces_online() {
        let (reg, _rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        reg.sweep_at(Utc::now() + chrono::Duration::seconds(60), Duration::from_secs(10))
            .await;
        assert_eq!(reg.get("AA0001").await.unwrap().status, StationStatus::Offline);

        reg.touch("AA0001").await.unwrap();
        assert_eq!(reg.get("AA0001").await.unwrap().status, StationStatus::Online);

        assert!(matches!(
            reg.touch("ZZ9999").await.unwrap_err(),
            CoreError::StationNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_sweep_is_edge_triggered() {
        let (reg, mut rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let _ = rx.recv().await; // station-online

        let later = Utc::now() + chrono::Duration::seconds(11);
        let first = reg.sweep_at(later, Duration::from_secs(10)).await;
        assert_eq!(first.len(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            StationEvent::StationOffline { ref mac, .. } if mac == "AA0001"
        ));

        // Still offline on the next sweeps: no further transitions, no events.
        let second = reg.sweep_at(later + chrono::Duration::seconds(30), Duration::from_secs(10)).await;
        assert!(second.is_empty());
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_sweep_ignores_fresh_stations() {
        let (reg, _rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let transitioned = reg
            .sweep_at(Utc::now() + chrono::Duration::seconds(5), Duration::from_secs(10))
            .await;
        assert!(transitioned.is_empty());
    }

    #[tokio::test]
    async fn test_apply_ping_offline_emits_once() {
        let (reg, mut rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let _ = rx.recv().await;

        reg.apply_ping("AA0001", false).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            StationEvent::StationOffline { .. }
        ));

        // Already offline: silent.
        reg.apply_ping("AA0001", false).await;
        assert!(rx.try_recv().is_none());

        reg.apply_ping("AA0001", true).await;
        assert_eq!(reg.get("AA0001").await.unwrap().status, StationStatus::Online);
    }

    #[tokio::test]
    async fn test_remove_publishes_removal() {
        let (reg, mut rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let _ = rx.recv().await;

        assert!(reg.remove("AA0001").await.is_some());
        assert!(matches!(
            rx.recv().await.unwrap(),
            StationEvent::StationRemoved { ref mac } if mac == "AA0001"
        ));
        assert!(reg.remove("AA0001").await.is_none());
    }

    #[tokio::test]
    async fn test_mark_resetting() {
        let (reg, _rx) = registry();
        reg.register(sensor("AA0001")).await.unwrap();
        let station = reg.mark_resetting("AA0001").await.unwrap();
        assert_eq!(station.status, StationStatus::Resetting);
    }
}
