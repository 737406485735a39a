//! # dualnode-provision
//!
//! Provisioning client for dualnode field stations.
//!
//! Drives the wireless provisioning handshake: discover an unprovisioned
//! device over BLE, read its Wi-Fi scan results, transfer network
//! credentials and the coordinator address, then wait for the device to
//! register with the coordinator over the network.
//!
//! ## Architecture
//!
//! - [`transport`] - Wireless transport abstraction with fail-fast session
//!   invalidation; BLE implementation behind the `ble` feature
//! - [`scan`] - Wi-Fi scan payload parsing and signal-strength ordering
//! - [`retry`] - Bounded-attempt helper for transient wireless reads
//! - [`probe`] - Coordinator registry query used during the registration wait
//! - [`session`] - The provisioning state machine
//! - [`error`] - Error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

#[cfg(feature = "ble")]
pub mod ble;
pub mod error;
pub mod probe;
pub mod retry;
pub mod scan;
pub mod session;
pub mod transport;

#[cfg(feature = "ble")]
pub use ble::BleTransport;
pub use error::{ProvisionError, Result, TransportError};
pub use probe::{HttpRegistryProbe, RegistryProbe};
pub use scan::parse_scan_results;
pub use session::{ProvisioningClient, SessionCancelHandle, SessionStep, SessionTimings};
pub use transport::{
    Characteristic, DeviceHandle, MockTransport, TransportSession, WirelessTransport,
    DEVICE_NAME_PREFIX,
};
