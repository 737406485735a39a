//! Error types for the provisioning client.
//!
//! [`TransportError`] covers the wireless link; [`ProvisionError`] covers
//! the whole provisioning flow. Every message names the failing step so a
//! user can tell a discovery problem from a registration one.

use thiserror::Error;

use crate::transport::Characteristic;

/// Failure modes of the wireless transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No wireless adapter is available on this system.
    #[error("No wireless adapter available: {0}")]
    AdapterUnavailable(String),

    /// Device discovery failed or found no matching device.
    #[error("No device matching '{filter}' was found. Ensure the station is powered and in provisioning mode.")]
    DeviceNotFound {
        /// Name filter used for discovery.
        filter: String,
    },

    /// Establishing the wireless session failed.
    #[error("Failed to connect to the device: {0}")]
    ConnectFailed(String),

    /// The session was disconnected; all characteristic references are
    /// invalid and operations fail fast.
    #[error("Wireless session is no longer valid; the device disconnected")]
    SessionInvalidated,

    /// A required characteristic is missing from the device.
    #[error("Device is missing the {0:?} characteristic; firmware may be outdated")]
    CharacteristicMissing(Characteristic),

    /// A read or write on the link failed.
    #[error("Wireless I/O failed: {0}")]
    Io(String),
}

/// Failure modes of the provisioning flow.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The wireless link failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The Wi-Fi scan read yielded nothing usable after all attempts.
    #[error("Network scan failed after {attempts} attempts: the device returned no valid networks")]
    ScanFailed {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The device never showed up in the coordinator registry.
    #[error(
        "Device did not register with the coordinator within {secs}s. \
         Verify the server address that was transferred to the device."
    )]
    RegistrationTimeout {
        /// Seconds waited before giving up.
        secs: u64,
    },

    /// The session was cancelled by the user.
    #[error("Provisioning was cancelled")]
    Cancelled,

    /// Configure was requested before network, password, and station type
    /// were all supplied.
    #[error("Cannot configure yet: network selection, password, and station type are all required")]
    IncompleteInput,

    /// An operation was requested in a step that does not allow it.
    #[error("Operation not valid in the current step: {0}")]
    InvalidStep(&'static str),

    /// The coordinator registry query failed.
    #[error("Coordinator query failed: {0}")]
    Probe(String),
}

/// A specialized [`Result`] type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Machine-readable code aligned with the coordinator's taxonomy.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::ScanFailed { .. } | Self::RegistrationTimeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::IncompleteInput | Self::InvalidStep(_) => "MISSING_PARAMS",
            Self::Probe(_) => "PROBE_ERROR",
        }
    }

    /// Returns `true` when the failure came from the wireless link.
    #[inline]
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
