//! Wireless transport abstraction.
//!
//! The provisioning link exposes four GATT characteristics: three
//! write-only values (coordinator address, network name, network password)
//! and one read-only Wi-Fi scan result. [`WirelessTransport`] abstracts
//! discover/connect/read/write/disconnect over that link.
//!
//! Sessions carry an atomic invalidation flag. Disconnecting — voluntarily
//! or device-initiated — sets the flag, after which every characteristic
//! operation fails fast with [`TransportError::SessionInvalidated`] rather
//! than silently dangling. Disconnect itself is idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::{uuid, Uuid};

use crate::error::TransportError;

/// Advertised name prefix of unprovisioned dualnode stations.
pub const DEVICE_NAME_PREFIX: &str = "DUALNODE_";

/// GATT service UUID of the provisioning surface.
pub const PROVISIONING_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// Provisioning characteristics exposed by station firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Write-only: coordinator address (`host:port`).
    ServerAddress,
    /// Write-only: Wi-Fi network name.
    NetworkName,
    /// Write-only: Wi-Fi network password.
    NetworkPassword,
    /// Read-only: semicolon-separated Wi-Fi scan records.
    ScanResults,
}

impl Characteristic {
    /// GATT UUID of this characteristic.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        match self {
            Self::ServerAddress => uuid!("8a8e1c4f-2d3b-4e9a-a1c7-5f6d8e9a0b1c"),
            Self::NetworkName => uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8"),
            Self::NetworkPassword => uuid!("1c95d5e3-d8f7-413a-bf3d-7a2e5d7be87e"),
            Self::ScanResults => uuid!("d8de624e-140f-4a22-8594-e2216b84a5f2"),
        }
    }
}

/// A discovered, not-yet-connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Advertised device name (e.g. `DUALNODE_A1B2C3`).
    pub name: String,
    /// Station identifier: the suffix after the last `_` in the name.
    pub mac: String,
    /// Transport-level address used to reconnect.
    pub address: String,
}

impl DeviceHandle {
    /// Build a handle from an advertised name, extracting the MAC suffix.
    #[must_use]
    pub fn from_advertisement(name: &str, address: &str) -> Self {
        let mac = name.rsplit('_').next().unwrap_or_default().to_string();
        Self {
            name: name.to_string(),
            mac,
            address: address.to_string(),
        }
    }
}

/// An established wireless session.
///
/// Cheap to clone; all clones share the invalidation flag.
#[derive(Debug, Clone)]
pub struct TransportSession {
    /// The device this session is connected to.
    pub device: DeviceHandle,
    id: u64,
    invalidated: Arc<AtomicBool>,
    disconnect_rx: watch::Receiver<bool>,
}

impl TransportSession {
    /// Create a live session; used by transport implementations.
    #[must_use]
    pub fn new(device: DeviceHandle, id: u64) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                device,
                id,
                invalidated: Arc::new(AtomicBool::new(false)),
                disconnect_rx: rx,
            },
            tx,
        )
    }

    /// Implementation-side session key.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// `true` while the session has not been invalidated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.invalidated.load(Ordering::SeqCst)
    }

    /// Invalidate the session. Called by the transport on any disconnect.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    /// Fail fast if the session has been invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionInvalidated`] once disconnected.
    pub fn ensure_valid(&self) -> Result<(), TransportError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(TransportError::SessionInvalidated)
        }
    }

    /// Watch for disconnection; the value flips to `true` once.
    #[must_use]
    pub fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnect_rx.clone()
    }
}

/// Capability surface of the provisioning link.
#[async_trait]
pub trait WirelessTransport: Send + Sync {
    /// Discover a device whose advertised name starts with `filter`.
    async fn discover(
        &self,
        filter: &str,
        timeout: Duration,
    ) -> Result<DeviceHandle, TransportError>;

    /// Establish a session with a discovered device.
    ///
    /// If the device is already connected from a stale session, the
    /// implementation must disconnect, wait a short fixed delay, and
    /// reconnect before returning.
    async fn connect(&self, handle: &DeviceHandle) -> Result<TransportSession, TransportError>;

    /// Read a characteristic value.
    async fn read_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError>;

    /// Write a characteristic value.
    async fn write_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Tear down a session. Idempotent: disconnecting an already
    /// invalidated session is a no-op.
    async fn disconnect(&self, session: &TransportSession) -> Result<(), TransportError>;
}

// =============================================================================
// MOCK TRANSPORT
// =============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scriptable in-memory transport for tests and non-Linux development.
///
/// Scan reads pop from a queue of scripted payloads; writes are recorded
/// in order for assertion.
#[derive(Default)]
pub struct MockTransport {
    inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
    device: Option<DeviceHandle>,
    scan_payloads: VecDeque<Vec<u8>>,
    writes: Vec<(Characteristic, Vec<u8>)>,
    fail_connect: bool,
    next_session_id: u64,
    live_senders: HashMap<u64, watch::Sender<bool>>,
}

impl MockTransport {
    /// Create an empty mock with no discoverable device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device discoverable.
    pub fn advertise(&self, name: &str) {
        let mut inner = self.inner.lock().expect("mock lock poisoned");
        inner.device = Some(DeviceHandle::from_advertisement(name, "mock:0"));
    }

    /// Queue a scan payload; each read consumes one entry. An exhausted
    /// queue reads as empty.
    pub fn push_scan_payload(&self, payload: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .expect("mock lock poisoned")
            .scan_payloads
            .push_back(payload.into());
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().expect("mock lock poisoned").fail_connect = true;
    }

    /// Characteristic writes recorded so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(Characteristic, Vec<u8>)> {
        self.inner.lock().expect("mock lock poisoned").writes.clone()
    }

    /// Number of sessions still connected.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.inner.lock().expect("mock lock poisoned").live_senders.len()
    }
}

#[async_trait]
impl WirelessTransport for MockTransport {
    async fn discover(
        &self,
        filter: &str,
        _timeout: Duration,
    ) -> Result<DeviceHandle, TransportError> {
        let inner = self.inner.lock().expect("mock lock poisoned");
        inner
            .device
            .clone()
            .filter(|d| d.name.starts_with(filter))
            .ok_or_else(|| TransportError::DeviceNotFound {
                filter: filter.to_string(),
            })
    }

    async fn connect(&self, handle: &DeviceHandle) -> Result<TransportSession, TransportError> {
        let mut inner = self.inner.lock().expect("mock lock poisoned");
        if inner.fail_connect {
            inner.fail_connect = false;
            return Err(TransportError::ConnectFailed("scripted failure".to_string()));
        }
        inner.next_session_id += 1;
        let id = inner.next_session_id;
        let (session, tx) = TransportSession::new(handle.clone(), id);
        inner.live_senders.insert(id, tx);
        Ok(session)
    }

    async fn read_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError> {
        session.ensure_valid()?;
        if characteristic != Characteristic::ScanResults {
            return Err(TransportError::Io("characteristic is write-only".to_string()));
        }
        let mut inner = self.inner.lock().expect("mock lock poisoned");
        Ok(inner.scan_payloads.pop_front().unwrap_or_default())
    }

    async fn write_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        session.ensure_valid()?;
        if characteristic == Characteristic::ScanResults {
            return Err(TransportError::Io("characteristic is read-only".to_string()));
        }
        self.inner
            .lock()
            .expect("mock lock poisoned")
            .writes
            .push((characteristic, value.to_vec()));
        Ok(())
    }

    async fn disconnect(&self, session: &TransportSession) -> Result<(), TransportError> {
        if !session.is_valid() {
            return Ok(());
        }
        session.invalidate();
        if let Some(tx) = self
            .inner
            .lock()
            .expect("mock lock poisoned")
            .live_senders
            .remove(&session.id())
        {
            let _ = tx.send(true);
        }
        Ok(())
    }
}
