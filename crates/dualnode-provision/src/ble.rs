//! BLE transport over BlueZ.
//!
//! [`BleTransport`] implements [`WirelessTransport`] using `bluer`. Each
//! connected session resolves the provisioning service's characteristics
//! once; a monitor task watches for device-initiated disconnects and
//! invalidates the session so pending operations fail fast instead of
//! dangling on dead GATT references.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluer::gatt::remote::Characteristic as GattCharacteristic;
use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures::{pin_mut, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{
    Characteristic, DeviceHandle, TransportSession, WirelessTransport, PROVISIONING_SERVICE,
};

/// Delay between disconnecting a stale session and reconnecting.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

struct Connection {
    device: bluer::Device,
    characteristics: HashMap<Characteristic, GattCharacteristic>,
    disconnect_tx: watch::Sender<bool>,
}

/// [`WirelessTransport`] over a BlueZ adapter.
pub struct BleTransport {
    adapter: Adapter,
    connections: Arc<Mutex<HashMap<u64, Connection>>>,
    next_session_id: AtomicU64,
}

impl BleTransport {
    /// Open the default Bluetooth adapter and power it on.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AdapterUnavailable`] when no adapter is
    /// present or it cannot be powered.
    pub async fn new() -> Result<Self, TransportError> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        adapter
            .set_powered(true)
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        Ok(Self {
            adapter,
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_session_id: AtomicU64::new(0),
        })
    }

    fn lookup_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
    ) -> Result<GattCharacteristic, TransportError> {
        let connections = self.connections.lock().expect("connection map poisoned");
        connections
            .get(&session.id())
            .ok_or(TransportError::SessionInvalidated)?
            .characteristics
            .get(&characteristic)
            .cloned()
            .ok_or(TransportError::CharacteristicMissing(characteristic))
    }

    async fn resolve_characteristics(
        device: &bluer::Device,
    ) -> Result<HashMap<Characteristic, GattCharacteristic>, TransportError> {
        let mut found = HashMap::new();
        let services = device
            .services()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        for service in services {
            let uuid = service.uuid().await.map_err(|e| TransportError::Io(e.to_string()))?;
            if uuid != PROVISIONING_SERVICE {
                continue;
            }
            let characteristics = service
                .characteristics()
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            for gatt in characteristics {
                let uuid = gatt.uuid().await.map_err(|e| TransportError::Io(e.to_string()))?;
                for kind in [
                    Characteristic::ServerAddress,
                    Characteristic::NetworkName,
                    Characteristic::NetworkPassword,
                    Characteristic::ScanResults,
                ] {
                    if uuid == kind.uuid() {
                        found.insert(kind, gatt.clone());
                    }
                }
            }
        }
        for kind in [
            Characteristic::ServerAddress,
            Characteristic::NetworkName,
            Characteristic::NetworkPassword,
            Characteristic::ScanResults,
        ] {
            if !found.contains_key(&kind) {
                return Err(TransportError::CharacteristicMissing(kind));
            }
        }
        Ok(found)
    }

    /// Watch the device and invalidate the session on a device-initiated
    /// disconnect.
    fn spawn_disconnect_monitor(&self, device: bluer::Device, session: TransportSession) {
        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            let Ok(events) = device.events().await else {
                return;
            };
            pin_mut!(events);
            while let Some(event) = events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                    warn!(device = %session.device.name, "device disconnected");
                    session.invalidate();
                    if let Some(conn) = connections
                        .lock()
                        .expect("connection map poisoned")
                        .remove(&session.id())
                    {
                        let _ = conn.disconnect_tx.send(true);
                    }
                    return;
                }
            }
        });
    }
}

#[async_trait]
impl WirelessTransport for BleTransport {
    async fn discover(
        &self,
        filter: &str,
        timeout: Duration,
    ) -> Result<DeviceHandle, TransportError> {
        debug!(filter, "starting device discovery");
        let events = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        pin_mut!(events);

        let found = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                if let AdapterEvent::DeviceAdded(addr) = event {
                    let Ok(device) = self.adapter.device(addr) else {
                        continue;
                    };
                    let Ok(Some(name)) = device.name().await else {
                        continue;
                    };
                    if name.starts_with(filter) {
                        info!(%name, %addr, "matching device found");
                        return Some(DeviceHandle::from_advertisement(&name, &addr.to_string()));
                    }
                }
            }
            None
        })
        .await;

        match found {
            Ok(Some(handle)) => Ok(handle),
            _ => Err(TransportError::DeviceNotFound {
                filter: filter.to_string(),
            }),
        }
    }

    async fn connect(&self, handle: &DeviceHandle) -> Result<TransportSession, TransportError> {
        let addr: Address = handle
            .address
            .parse()
            .map_err(|_| TransportError::ConnectFailed(format!("bad address {}", handle.address)))?;
        let device = self
            .adapter
            .device(addr)
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        // Stale-session guard: a lingering connection keeps dead GATT
        // references alive, so drop it and give the stack time to settle.
        if device
            .is_connected()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?
        {
            debug!(device = %handle.name, "already connected; cycling the connection");
            let _ = device.disconnect().await;
            tokio::time::sleep(RECONNECT_DELAY).await;
        }

        device
            .connect()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        let characteristics = Self::resolve_characteristics(&device).await?;

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (session, disconnect_tx) = TransportSession::new(handle.clone(), id);
        self.connections.lock().expect("connection map poisoned").insert(
            id,
            Connection {
                device: device.clone(),
                characteristics,
                disconnect_tx,
            },
        );
        self.spawn_disconnect_monitor(device, session.clone());
        info!(device = %handle.name, "session established");
        Ok(session)
    }

    async fn read_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError> {
        session.ensure_valid()?;
        let gatt = self.lookup_characteristic(session, characteristic)?;
        gatt.read().await.map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn write_characteristic(
        &self,
        session: &TransportSession,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        session.ensure_valid()?;
        let gatt = self.lookup_characteristic(session, characteristic)?;
        gatt.write(value).await.map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn disconnect(&self, session: &TransportSession) -> Result<(), TransportError> {
        if !session.is_valid() {
            return Ok(());
        }
        session.invalidate();
        let conn = self
            .connections
            .lock()
            .expect("connection map poisoned")
            .remove(&session.id());
        if let Some(conn) = conn {
            let _ = conn.disconnect_tx.send(true);
            if let Err(err) = conn.device.disconnect().await {
                debug!(error = %err, "device disconnect failed");
            }
        }
        Ok(())
    }
}
