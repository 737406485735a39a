//! Periodic station liveness sweep.
//!
//! Runs on a fixed interval and edge-triggers offline transitions for
//! stations whose last heartbeat is older than the configured threshold.
//! The transition itself (and its single `station-offline` event) lives in
//! [`StationRegistry::sweep_at`]; this task only supplies the cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::registry::StationRegistry;

/// Background task sweeping the registry for stale stations.
pub struct PresenceMonitor {
    registry: Arc<StationRegistry>,
    interval: Duration,
    threshold: Duration,
}

impl PresenceMonitor {
    /// Create a monitor from the registry configuration.
    #[must_use]
    pub fn new(registry: Arc<StationRegistry>, config: &RegistryConfig) -> Self {
        Self {
            registry,
            interval: Duration::from_secs(config.sweep_interval_secs),
            threshold: Duration::from_secs(config.offline_threshold_secs),
        }
    }

    /// Run the sweep loop forever. Intended to be spawned.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so a freshly started
        // coordinator does not sweep before any station could report.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let transitioned = self.registry.sweep_at(Utc::now(), self.threshold).await;
            if !transitioned.is_empty() {
                debug!(count = transitioned.len(), "presence sweep marked stations offline");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::registry::NewStation;
    use crate::types::StationType;

    #[tokio::test]
    async fn test_monitor_sweeps_on_interval() {
        let bus = EventBus::new();
        let config = RegistryConfig {
            sweep_interval_secs: 1,
            ..RegistryConfig::default()
        };
        let registry = Arc::new(StationRegistry::new(&config, bus));
        registry
            .register(NewStation {
                mac: "AA0001".to_string(),
                name: None,
                station_type: StationType::SensorNode,
                addr: "10.0.0.9".to_string(),
            })
            .await
            .unwrap();

        let monitor = PresenceMonitor::new(Arc::clone(&registry), &config);
        let handle = tokio::spawn(monitor.run());

        // A fresh station survives a couple of sweep intervals online.
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(
            registry.get("AA0001").await.unwrap().status,
            crate::types::StationStatus::Online
        );
        handle.abort();
    }
}
