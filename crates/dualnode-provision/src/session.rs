//! The provisioning session state machine.
//!
//! Linear flow with one retry loop:
//!
//! ```text
//! Idle → Discovering → Connected → ScanningNetworks → AwaitingUserInput
//!      → SendingConfig → AwaitingDeviceReboot → WaitingRegistration
//!      → {Success | Failed}
//! ```
//!
//! The transport provides no acknowledgment beyond write completion, so the
//! credential transfer is an ordered write sequence with fixed settle
//! delays standing in for protocol-level flow control. Failures during
//! discovery or connection return to `Idle`; later failures disconnect the
//! transport (best-effort) and return to network selection. The whole
//! session — and nothing smaller — can be cancelled at any point through a
//! [`SessionCancelHandle`].

use std::sync::Arc;
use std::time::Duration;

use dualnode_core::types::{StationType, WifiNetwork};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProvisionError, Result};
use crate::probe::RegistryProbe;
use crate::retry::bounded_retry;
use crate::scan::parse_scan_results;
use crate::transport::{
    Characteristic, DeviceHandle, TransportSession, WirelessTransport, DEVICE_NAME_PREFIX,
};

/// Current step of a provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// No session in progress.
    Idle,
    /// Looking for a device matching the name filter.
    Discovering,
    /// Wireless session established.
    Connected,
    /// Reading and parsing the device's Wi-Fi scan results.
    ScanningNetworks,
    /// Waiting for the user to pick a network, password, and station type.
    AwaitingUserInput,
    /// Transferring credentials with settle delays.
    SendingConfig,
    /// Device is rebooting onto the target network.
    AwaitingDeviceReboot,
    /// Polling the coordinator for the device's registration.
    WaitingRegistration,
    /// The device registered and is online.
    Success,
    /// The session failed; see the reported error.
    Failed,
}

/// Fixed delays and deadlines of the provisioning flow.
///
/// Defaults are the production values; tests substitute shorter ones.
#[derive(Debug, Clone)]
pub struct SessionTimings {
    /// How long discovery may take before giving up.
    pub discovery_timeout: Duration,
    /// Scan read attempts before failing.
    pub scan_attempts: u32,
    /// Delay between scan read attempts.
    pub scan_retry_delay: Duration,
    /// Settle delay after writing the server address.
    pub settle_server: Duration,
    /// Settle delay after writing the network name.
    pub settle_ssid: Duration,
    /// Settle delay after writing the password, long enough for the device
    /// to start acting on the complete configuration.
    pub settle_password: Duration,
    /// Wait after the proactive disconnect.
    pub post_disconnect_wait: Duration,
    /// Wait for the device to reboot and reassociate.
    pub reboot_wait: Duration,
    /// Total time to wait for the device to appear in the registry.
    pub registration_timeout: Duration,
    /// Interval between registry polls.
    pub registration_poll: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(30),
            scan_attempts: 3,
            scan_retry_delay: Duration::from_secs(2),
            settle_server: Duration::from_millis(800),
            settle_ssid: Duration::from_millis(800),
            settle_password: Duration::from_secs(3),
            post_disconnect_wait: Duration::from_secs(1),
            reboot_wait: Duration::from_secs(5),
            registration_timeout: Duration::from_secs(20),
            registration_poll: Duration::from_secs(1),
        }
    }
}

/// Handle for cancelling a running session from another task.
#[derive(Debug, Clone)]
pub struct SessionCancelHandle {
    token: CancellationToken,
}

impl SessionCancelHandle {
    /// Cancel the session. In-flight waits return
    /// [`ProvisionError::Cancelled`]; the owner then calls
    /// [`ProvisioningClient::reset_state`] to tear down.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Client side of the device provisioning protocol.
pub struct ProvisioningClient {
    transport: Arc<dyn WirelessTransport>,
    probe: Arc<dyn RegistryProbe>,
    timings: SessionTimings,

    step: SessionStep,
    device: Option<DeviceHandle>,
    session: Option<TransportSession>,
    networks: Vec<WifiNetwork>,
    selected_ssid: Option<String>,
    password: Option<String>,
    station_type: Option<StationType>,
    cancel: CancellationToken,
}

impl ProvisioningClient {
    /// Create an idle client.
    #[must_use]
    pub fn new(
        transport: Arc<dyn WirelessTransport>,
        probe: Arc<dyn RegistryProbe>,
        timings: SessionTimings,
    ) -> Self {
        Self {
            transport,
            probe,
            timings,
            step: SessionStep::Idle,
            device: None,
            session: None,
            networks: Vec::new(),
            selected_ssid: None,
            password: None,
            station_type: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Current step.
    #[must_use]
    pub const fn step(&self) -> SessionStep {
        self.step
    }

    /// Networks discovered by the device, strongest signal first.
    #[must_use]
    pub fn networks(&self) -> &[WifiNetwork] {
        &self.networks
    }

    /// The device being provisioned, once discovered.
    #[must_use]
    pub const fn device(&self) -> Option<&DeviceHandle> {
        self.device.as_ref()
    }

    /// Handle for cancelling this session from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> SessionCancelHandle {
        SessionCancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Drive the session from `Idle` through discovery, connection, and
    /// network scan, leaving it at `AwaitingUserInput`.
    ///
    /// Returns the discovered networks sorted by descending signal
    /// strength.
    ///
    /// # Errors
    ///
    /// Discovery and connection failures return the session to `Idle`
    /// without automatic retry. Scan failures (3 attempts exhausted, or a
    /// transport error mid-scan) tear down the link and leave the session
    /// `Failed`.
    pub async fn discover_and_scan(&mut self) -> Result<Vec<WifiNetwork>> {
        if self.step != SessionStep::Idle {
            return Err(ProvisionError::InvalidStep(
                "discovery can only start from an idle session",
            ));
        }

        self.step = SessionStep::Discovering;
        let device = tokio::select! {
            () = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            found = self.transport.discover(DEVICE_NAME_PREFIX, self.timings.discovery_timeout) => {
                found.map_err(ProvisionError::from)
            }
        };
        let device = match device {
            Ok(device) => device,
            Err(err) => {
                self.step = SessionStep::Idle;
                return Err(err);
            }
        };
        info!(name = %device.name, mac = %device.mac, "device discovered");
        self.device = Some(device.clone());

        self.step = SessionStep::Connected;
        let session = match self.transport.connect(&device).await {
            Ok(session) => session,
            Err(err) => {
                self.device = None;
                self.step = SessionStep::Idle;
                return Err(err.into());
            }
        };
        self.session = Some(session);

        self.step = SessionStep::ScanningNetworks;
        match self.read_networks().await {
            Ok(networks) => {
                info!(count = networks.len(), "networks discovered");
                self.networks = networks.clone();
                self.step = SessionStep::AwaitingUserInput;
                Ok(networks)
            }
            Err(err) => {
                self.teardown_transport().await;
                self.step = SessionStep::Failed;
                Err(err)
            }
        }
    }

    /// Select one of the discovered networks.
    ///
    /// # Errors
    ///
    /// Rejects SSIDs that were not in the scan results, or calls outside
    /// `AwaitingUserInput`.
    pub fn select_network(&mut self, ssid: &str) -> Result<()> {
        if self.step != SessionStep::AwaitingUserInput {
            return Err(ProvisionError::InvalidStep(
                "network selection requires completed scan results",
            ));
        }
        if !self.networks.iter().any(|n| n.ssid == ssid) {
            return Err(ProvisionError::InvalidStep(
                "selected network is not in the scan results",
            ));
        }
        self.selected_ssid = Some(ssid.to_string());
        Ok(())
    }

    /// Supply the network password.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    /// Supply the station type the device should assume.
    pub fn set_station_type(&mut self, station_type: StationType) {
        self.station_type = Some(station_type);
    }

    /// `true` once network, password, and station type are all present.
    #[must_use]
    pub fn can_configure(&self) -> bool {
        self.selected_ssid.is_some()
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
            && self.station_type.is_some()
    }

    /// Transfer the configuration and wait for the device to register.
    ///
    /// Writes the coordinator address, network name, and password in that
    /// order with settle delays after each write, proactively disconnects,
    /// waits out the device reboot, then polls the coordinator until the
    /// device appears online.
    ///
    /// # Errors
    ///
    /// Any failure after the transfer started disconnects the transport
    /// (best-effort) and returns the session to `AwaitingUserInput` so the
    /// user can adjust the selection and retry.
    pub async fn configure(&mut self, server_addr: &str) -> Result<()> {
        if self.step != SessionStep::AwaitingUserInput {
            return Err(ProvisionError::InvalidStep(
                "configure requires completed user input",
            ));
        }
        if !self.can_configure() {
            return Err(ProvisionError::IncompleteInput);
        }

        self.step = SessionStep::SendingConfig;
        match self.transfer_and_wait(server_addr).await {
            Ok(()) => {
                self.step = SessionStep::Success;
                Ok(())
            }
            Err(err) => {
                self.teardown_transport().await;
                if !matches!(err, ProvisionError::Cancelled) {
                    self.step = SessionStep::AwaitingUserInput;
                }
                Err(err)
            }
        }
    }

    /// Cancel-safe teardown, callable from any state.
    ///
    /// Disconnects the transport if connected and clears every session
    /// field. This is the guarantee that no wireless handle survives a
    /// closed or restarted session.
    pub async fn reset_state(&mut self) {
        debug!("resetting provisioning session");
        self.teardown_transport().await;
        self.device = None;
        self.networks.clear();
        self.selected_ssid = None;
        self.password = None;
        self.station_type = None;
        self.step = SessionStep::Idle;
        self.cancel = CancellationToken::new();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn read_networks(&mut self) -> Result<Vec<WifiNetwork>> {
        let session = self.session.clone().ok_or(ProvisionError::InvalidStep(
            "no transport session for scanning",
        ))?;
        let transport = Arc::clone(&self.transport);
        let cancel = self.cancel.clone();

        bounded_retry(
            self.timings.scan_attempts,
            self.timings.scan_retry_delay,
            &cancel,
            |attempt| {
                let transport = Arc::clone(&transport);
                let session = session.clone();
                async move {
                    debug!(attempt, "reading scan results");
                    let raw = transport
                        .read_characteristic(&session, Characteristic::ScanResults)
                        .await?;
                    let text = String::from_utf8_lossy(&raw);
                    let networks = parse_scan_results(&text);
                    Ok((!networks.is_empty()).then_some(networks))
                }
            },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
    }

    async fn transfer_and_wait(&mut self, server_addr: &str) -> Result<()> {
        let device = self
            .device
            .clone()
            .ok_or(ProvisionError::InvalidStep("no device selected"))?;

        // A stale session from an earlier attempt has to be replaced; the
        // transport's connect handles the disconnect-wait-reconnect guard.
        let session = match self.session.as_ref().filter(|s| s.is_valid()) {
            Some(session) => session.clone(),
            None => {
                let session = self.transport.connect(&device).await?;
                self.session = Some(session.clone());
                session
            }
        };

        let ssid = self.selected_ssid.clone().ok_or(ProvisionError::IncompleteInput)?;
        let password = self.password.clone().ok_or(ProvisionError::IncompleteInput)?;

        // Ordered writes with settle delays; the link has no higher-level
        // acknowledgment than write completion.
        self.transport
            .write_characteristic(&session, Characteristic::ServerAddress, server_addr.as_bytes())
            .await?;
        self.sleep(self.timings.settle_server).await?;

        self.transport
            .write_characteristic(&session, Characteristic::NetworkName, ssid.as_bytes())
            .await?;
        self.sleep(self.timings.settle_ssid).await?;

        self.transport
            .write_characteristic(&session, Characteristic::NetworkPassword, password.as_bytes())
            .await?;
        self.sleep(self.timings.settle_password).await?;

        // Proactive disconnect so the device can start reassociating.
        self.transport.disconnect(&session).await?;
        self.session = None;
        self.sleep(self.timings.post_disconnect_wait).await?;

        self.step = SessionStep::AwaitingDeviceReboot;
        self.sleep(self.timings.reboot_wait).await?;

        self.step = SessionStep::WaitingRegistration;
        self.wait_for_registration(&device.mac).await
    }

    async fn wait_for_registration(&self, mac: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.timings.registration_timeout;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled);
            }
            match self.probe.station_online(mac).await {
                Ok(true) => {
                    info!(mac, "device registered with the coordinator");
                    return Ok(());
                }
                Ok(false) => {}
                // Transient coordinator hiccups do not fail the wait; only
                // the overall deadline does.
                Err(err) => debug!(mac, error = %err, "registry poll failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(mac, "device never appeared in the registry");
                return Err(ProvisionError::RegistrationTimeout {
                    secs: self.timings.registration_timeout.as_secs(),
                });
            }
            self.sleep(self.timings.registration_poll).await?;
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    async fn teardown_transport(&mut self) {
        if let Some(session) = self.session.take() {
            // Best-effort: the device may already be gone.
            if let Err(err) = self.transport.disconnect(&session).await {
                debug!(error = %err, "teardown disconnect failed");
            }
        }
    }
}
