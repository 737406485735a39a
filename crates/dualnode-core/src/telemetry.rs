//! Bounded per-station telemetry storage with rolling statistics.
//!
//! Each sensor station owns one [`TelemetryRecord`]: the latest reading, a
//! newest-first history capped at the configured capacity, and min/max/avg
//! statistics for temperature and humidity. Statistics cover exactly the
//! retained window and are recomputed in full on every insert; the window
//! is bounded, so the recompute cost is constant.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::events::{EventBus, StationEvent};
use crate::registry::StationRegistry;
use crate::types::{SensorReading, TelemetryRecord, TelemetryStats};

/// Raw sensor values as reported by a station.
#[derive(Debug, Clone, Copy)]
pub struct ReportedReading {
    /// Temperature in degrees Celsius.
    pub temp: f64,
    /// Relative humidity in percent.
    pub hum: f64,
    /// Distance in centimeters.
    pub dist: f64,
}

/// Store of telemetry records keyed by station identifier.
pub struct TelemetryStore {
    records: RwLock<HashMap<String, TelemetryRecord>>,
    capacity: usize,
    registry: Arc<StationRegistry>,
    bus: EventBus,
}

impl TelemetryStore {
    /// Create an empty store bound to the registry.
    #[must_use]
    pub fn new(config: &TelemetryConfig, registry: Arc<StationRegistry>, bus: EventBus) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            capacity: config.history_capacity,
            registry,
            bus,
        }
    }

    /// Ingest a reading for a registered station.
    ///
    /// Applies the heartbeat (refreshing `last_seen` and forcing the
    /// station online), prepends the reading to the bounded history,
    /// recomputes statistics over the retained window, and publishes a
    /// `sensor-update` event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::StationNotFound`] when the identifier is
    /// not registered; nothing is stored in that case.
    pub async fn ingest(&self, mac: &str, reported: ReportedReading) -> Result<TelemetryRecord> {
        // Heartbeat first; also rejects unknown stations.
        self.registry.touch(mac).await?;

        let reading = SensorReading {
            temp: reported.temp,
            hum: reported.hum,
            dist: reported.dist,
            timestamp: Utc::now(),
        };

        let record = {
            let mut records = self.records.write().await;
            let record = records.entry(mac.to_string()).or_insert_with(|| TelemetryRecord {
                current: reading,
                history: Vec::new(),
                stats: stats_of(&[reading]),
            });

            record.current = reading;
            record.history.insert(0, reading);
            record.history.truncate(self.capacity);
            record.stats = stats_of(&record.history);
            record.clone()
        };

        debug!(mac, temp = reported.temp, hum = reported.hum, dist = reported.dist, "reading ingested");
        self.bus
            .publish(StationEvent::sensor_update(mac, &reading, record.stats));

        Ok(record)
    }

    /// Latest reading for a station, if any was ingested.
    pub async fn current(&self, mac: &str) -> Option<SensorReading> {
        self.records.read().await.get(mac).map(|r| r.current)
    }

    /// Full record (current, history, stats) for a station.
    pub async fn record(&self, mac: &str) -> Option<TelemetryRecord> {
        self.records.read().await.get(mac).cloned()
    }

    /// Up to `limit` retained readings for a station, newest first.
    pub async fn history(&self, mac: &str, limit: usize) -> Vec<SensorReading> {
        self.records
            .read()
            .await
            .get(mac)
            .map(|r| r.history.iter().take(limit).copied().collect())
            .unwrap_or_default()
    }

    /// Drop a station's telemetry, e.g. after removal from the registry.
    pub async fn forget(&self, mac: &str) {
        self.records.write().await.remove(mac);
    }
}

/// Min/max/average over a non-empty window of readings.
fn stats_of(window: &[SensorReading]) -> TelemetryStats {
    debug_assert!(!window.is_empty());
    let n = window.len() as f64;
    let mut stats = TelemetryStats {
        temp_min: f64::INFINITY,
        temp_max: f64::NEG_INFINITY,
        temp_avg: 0.0,
        hum_min: f64::INFINITY,
        hum_max: f64::NEG_INFINITY,
        hum_avg: 0.0,
    };
    for r in window {
        stats.temp_min = stats.temp_min.min(r.temp);
        stats.temp_max = stats.temp_max.max(r.temp);
        stats.temp_avg += r.temp;
        stats.hum_min = stats.hum_min.min(r.hum);
        stats.hum_max = stats.hum_max.max(r.hum);
        stats.hum_avg += r.hum;
    }
    stats.temp_avg /= n;
    stats.hum_avg /= n;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::registry::NewStation;
    use crate::types::StationType;

    async fn store() -> (TelemetryStore, Arc<StationRegistry>, crate::events::EventReceiver) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let registry = Arc::new(StationRegistry::new(&RegistryConfig::default(), bus.clone()));
        registry
            .register(NewStation {
                mac: "AA0001".to_string(),
                name: None,
                station_type: StationType::SensorNode,
                addr: "10.0.0.9".to_string(),
            })
            .await
            .unwrap();
        let store = TelemetryStore::new(&TelemetryConfig::default(), Arc::clone(&registry), bus);
        (store, registry, rx)
    }

    fn reading(temp: f64, hum: f64) -> ReportedReading {
        ReportedReading {
            temp,
            hum,
            dist: 150.0,
        }
    }

    #[tokio::test]
    async fn test_ingest_unregistered_station_rejected() {
        let (store, _reg, _rx) = store().await;
        let err = store.ingest("ZZ9999", reading(22.0, 40.0)).await.unwrap_err();
        assert!(matches!(err, crate::CoreError::StationNotFound(_)));
        assert!(store.current("ZZ9999").await.is_none());
    }

    #[tokio::test]
    async fn test_first_reading_sets_degenerate_stats() {
        let (store, _reg, _rx) = store().await;
        let record = store.ingest("AA0001", reading(22.0, 40.0)).await.unwrap();
        assert_eq!(record.stats.temp_min, 22.0);
        assert_eq!(record.stats.temp_max, 22.0);
        assert_eq!(record.stats.temp_avg, 22.0);
        assert_eq!(record.stats.hum_min, 40.0);
        assert_eq!(record.stats.hum_max, 40.0);

        let current = store.current("AA0001").await.unwrap();
        assert_eq!(current.temp, 22.0);
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_bounded() {
        let bus = EventBus::new();
        let registry = Arc::new(StationRegistry::new(&RegistryConfig::default(), bus.clone()));
        registry
            .register(NewStation {
                mac: "AA0001".to_string(),
                name: None,
                station_type: StationType::SensorNode,
                addr: "10.0.0.9".to_string(),
            })
            .await
            .unwrap();
        let config = TelemetryConfig { history_capacity: 100 };
        let store = TelemetryStore::new(&config, registry, bus);

        for i in 0..101 {
            store.ingest("AA0001", reading(f64::from(i), 40.0)).await.unwrap();
        }

        let history = store.history("AA0001", usize::MAX).await;
        assert_eq!(history.len(), 100);
        // Newest first; the oldest reading (temp 0) was dropped.
        assert_eq!(history[0].temp, 100.0);
        assert_eq!(history[99].temp, 1.0);
    }

    #[tokio::test]
    async fn test_stats_cover_exactly_the_retained_window() {
        let bus = EventBus::new();
        let registry = Arc::new(StationRegistry::new(&RegistryConfig::default(), bus.clone()));
        registry
            .register(NewStation {
                mac: "AA0001".to_string(),
                name: None,
                station_type: StationType::SensorNode,
                addr: "10.0.0.9".to_string(),
            })
            .await
            .unwrap();
        let config = TelemetryConfig { history_capacity: 3 };
        let store = TelemetryStore::new(&config, registry, bus);

        // An extreme early value must fall out of the stats once evicted.
        store.ingest("AA0001", reading(99.0, 10.0)).await.unwrap();
        store.ingest("AA0001", reading(20.0, 40.0)).await.unwrap();
        store.ingest("AA0001", reading(22.0, 42.0)).await.unwrap();
        let record = store.ingest("AA0001", reading(24.0, 44.0)).await.unwrap();

        assert_eq!(record.stats.temp_min, 20.0);
        assert_eq!(record.stats.temp_max, 24.0);
        assert!((record.stats.temp_avg - 22.0).abs() < 1e-9);
        assert_eq!(record.stats.hum_min, 40.0);
        assert_eq!(record.stats.hum_max, 44.0);
    }

    #[tokio::test]
    async fn test_ingest_publishes_sensor_update() {
        let (store, _reg, mut rx) = store().await;
        let _ = rx.recv().await; // station-online from registration

        store.ingest("AA0001", reading(22.0, 40.0)).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            StationEvent::SensorUpdate { ref mac, temp, .. } if mac == "AA0001" && temp == 22.0
        ));
    }

    #[tokio::test]
    async fn test_ingest_applies_heartbeat() {
        let (store, registry, _rx) = store().await;
        registry
            .sweep_at(Utc::now() + chrono::Duration::seconds(60), std::time::Duration::from_secs(10))
            .await;
        assert_eq!(
            registry.get("AA0001").await.unwrap().status,
            crate::types::StationStatus::Offline
        );

        store.ingest("AA0001", reading(22.0, 40.0)).await.unwrap();
        assert_eq!(
            registry.get("AA0001").await.unwrap().status,
            crate::types::StationStatus::Online
        );
    }

    #[tokio::test]
    async fn test_history_limit() {
        let (store, _reg, _rx) = store().await;
        for i in 0..5 {
            store.ingest("AA0001", reading(f64::from(i), 40.0)).await.unwrap();
        }
        let history = store.history("AA0001", 2).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].temp, 4.0);
    }
}
