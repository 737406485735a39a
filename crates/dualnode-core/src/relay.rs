//! Command relay: dispatching generated code to stations.
//!
//! The relay resolves a station's network address from the registry and
//! drives the device-side HTTP endpoints (`/execute`, `/stop`, `/reset`,
//! `/ping`). The device side sits behind the [`StationLink`] trait so the
//! relay logic can be exercised against a scripted link in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::CommandLog;
use crate::config::CommandsConfig;
use crate::error::{CoreError, Result};
use crate::events::{EventBus, StationEvent};
use crate::registry::StationRegistry;
use crate::telemetry::TelemetryStore;
use crate::types::Station;

/// Failure modes of a device-side call.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device did not answer within the deadline.
    #[error("station did not answer within {secs}s")]
    Timeout {
        /// Deadline that was exceeded.
        secs: u64,
    },

    /// The device answered with a non-success status.
    #[error("station rejected the request with status {status}")]
    Rejected {
        /// HTTP status reported by the device.
        status: u16,
    },

    /// The device could not be reached at all.
    #[error("station unreachable: {0}")]
    Unreachable(String),
}

/// Device-side call surface of a station.
#[async_trait]
pub trait StationLink: Send + Sync {
    /// Send generated code for immediate execution.
    async fn execute(
        &self,
        addr: &str,
        code: &str,
    ) -> std::result::Result<serde_json::Value, LinkError>;

    /// Stop the current execution.
    async fn stop(&self, addr: &str) -> std::result::Result<(), LinkError>;

    /// Trigger a device-side reset.
    async fn reset(&self, addr: &str) -> std::result::Result<(), LinkError>;

    /// Liveness probe. `true` when the device answered in time.
    async fn ping(&self, addr: &str) -> bool;
}

/// [`StationLink`] over plain HTTP, as the station firmware expects.
pub struct HttpStationLink {
    client: reqwest::Client,
    dispatch_timeout: Duration,
    ping_timeout: Duration,
}

impl HttpStationLink {
    /// Build a link using the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &CommandsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            dispatch_timeout: Duration::from_secs(config.dispatch_timeout_secs),
            ping_timeout: Duration::from_secs(config.ping_timeout_secs),
        })
    }

    fn map_send_error(err: &reqwest::Error, secs: u64) -> LinkError {
        if err.is_timeout() {
            LinkError::Timeout { secs }
        } else {
            LinkError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl StationLink for HttpStationLink {
    async fn execute(
        &self,
        addr: &str,
        code: &str,
    ) -> std::result::Result<serde_json::Value, LinkError> {
        let url = format!("http://{addr}/execute");
        let secs = self.dispatch_timeout.as_secs();
        let response = self
            .client
            .post(&url)
            .timeout(self.dispatch_timeout)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await
            .map_err(|e| Self::map_send_error(&e, secs))?;

        if !response.status().is_success() {
            return Err(LinkError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await.unwrap_or_default())
    }

    async fn stop(&self, addr: &str) -> std::result::Result<(), LinkError> {
        let url = format!("http://{addr}/stop");
        let secs = self.dispatch_timeout.as_secs();
        let response = self
            .client
            .post(&url)
            .timeout(self.dispatch_timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&e, secs))?;
        if !response.status().is_success() {
            return Err(LinkError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn reset(&self, addr: &str) -> std::result::Result<(), LinkError> {
        let url = format!("http://{addr}/reset");
        let secs = self.dispatch_timeout.as_secs();
        let response = self
            .client
            .post(&url)
            .timeout(self.dispatch_timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&e, secs))?;
        if !response.status().is_success() {
            return Err(LinkError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn ping(&self, addr: &str) -> bool {
        let url = format!("http://{addr}/ping");
        matches!(
            self.client.get(&url).timeout(self.ping_timeout).send().await,
            Ok(response) if response.status().is_success()
        )
    }
}

/// Orchestrates code dispatch, stop, reset, and liveness pings.
pub struct CommandRelay {
    registry: Arc<StationRegistry>,
    commands: Arc<CommandLog>,
    telemetry: Arc<TelemetryStore>,
    link: Arc<dyn StationLink>,
    bus: EventBus,
    reset_grace: Duration,
}

impl CommandRelay {
    /// Wire up the relay against its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<StationRegistry>,
        commands: Arc<CommandLog>,
        telemetry: Arc<TelemetryStore>,
        link: Arc<dyn StationLink>,
        bus: EventBus,
        reset_grace: Duration,
    ) -> Self {
        Self {
            registry,
            commands,
            telemetry,
            link,
            bus,
            reset_grace,
        }
    }

    /// Dispatch generated code to a station.
    ///
    /// On success the command is marked `executed` and `led-executed` is
    /// broadcast. On failure the command is marked `error` with the error
    /// text and the failure is surfaced without touching registry state.
    ///
    /// # Errors
    ///
    /// [`CoreError::StationNotFound`] for unknown identifiers,
    /// [`CoreError::Timeout`] when the device missed the dispatch deadline,
    /// [`CoreError::Execution`] for any other device-side failure.
    pub async fn dispatch(
        &self,
        mac: &str,
        code: &str,
        command_id: Uuid,
    ) -> Result<serde_json::Value> {
        let station = self
            .registry
            .get(mac)
            .await
            .ok_or_else(|| CoreError::StationNotFound(mac.to_string()))?;

        info!(mac, command_id = %command_id, "dispatching code to station");
        match self.link.execute(&station.addr, code).await {
            Ok(result) => {
                self.commands.mark_executed(mac, command_id).await;
                self.bus.publish(StationEvent::LedExecuted {
                    station_mac: mac.to_string(),
                    command_id,
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                warn!(mac, command_id = %command_id, error = %err, "dispatch failed");
                self.commands.mark_error(mac, command_id, err.to_string()).await;
                match err {
                    LinkError::Timeout { secs } => Err(CoreError::Timeout {
                        secs,
                        operation: "dispatching code to station",
                    }),
                    other => Err(CoreError::Execution {
                        mac: mac.to_string(),
                        message: other.to_string(),
                    }),
                }
            }
        }
    }

    /// Stop a station's current execution.
    ///
    /// The stop signal is best-effort: `led-stopped` is broadcast
    /// unconditionally, the viewer-visible dark-LED state being assumed
    /// optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StationNotFound`] for unknown identifiers.
    pub async fn stop(&self, mac: &str) -> Result<()> {
        let station = self
            .registry
            .get(mac)
            .await
            .ok_or_else(|| CoreError::StationNotFound(mac.to_string()))?;

        if let Err(err) = self.link.stop(&station.addr).await {
            warn!(mac, error = %err, "stop signal not acknowledged");
        }
        self.bus.publish(StationEvent::LedStopped {
            station_mac: mac.to_string(),
        });
        Ok(())
    }

    /// Reset a station: device-side reset, then scheduled removal.
    ///
    /// On a successful reset the station is marked `resetting` and removed
    /// from the registry (with its telemetry and command history) after the
    /// configured grace period, giving the device time to reboot into the
    /// unprovisioned state.
    ///
    /// # Errors
    ///
    /// [`CoreError::StationNotFound`] for unknown identifiers,
    /// [`CoreError::Execution`] when the device rejected the reset.
    pub async fn reset(&self, mac: &str) -> Result<()> {
        let station = self
            .registry
            .get(mac)
            .await
            .ok_or_else(|| CoreError::StationNotFound(mac.to_string()))?;

        self.link.reset(&station.addr).await.map_err(|err| CoreError::Execution {
            mac: mac.to_string(),
            message: err.to_string(),
        })?;

        self.registry.mark_resetting(mac).await?;
        info!(mac, grace_secs = self.reset_grace.as_secs(), "station resetting; removal scheduled");

        let registry = Arc::clone(&self.registry);
        let telemetry = Arc::clone(&self.telemetry);
        let commands = Arc::clone(&self.commands);
        let grace = self.reset_grace;
        let mac = mac.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            registry.remove(&mac).await;
            telemetry.forget(&mac).await;
            commands.forget(&mac).await;
        });

        Ok(())
    }

    /// Probe every registered station and refresh its status.
    ///
    /// Returns the full station list with statuses updated, for the
    /// `stations-status` reply to the requesting viewer.
    pub async fn ping_all(&self) -> Vec<Station> {
        for station in self.registry.list().await {
            let reachable = self.link.ping(&station.addr).await;
            self.registry.apply_ping(&station.mac, reachable).await;
        }
        self.registry.list().await
    }
}
