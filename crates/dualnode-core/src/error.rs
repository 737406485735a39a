//! Unified error types for the dualnode core library.
//!
//! This module provides a unified error type [`CoreError`] that covers the
//! failure modes of the coordinator: registry invariant violations, missing
//! stations, collaborator failures, and device dispatch problems.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages name the failing step
//! - **HTTP-ready**: Error types include HTTP status codes and error codes

use thiserror::Error;

/// The unified error type for coordinator operations.
#[derive(Debug, Error)]
pub enum CoreError {
    // =========================================================================
    // REGISTRY ERRORS
    // =========================================================================
    /// The registry already holds the maximum number of stations.
    #[error("Station limit reached: at most {max} stations may be registered")]
    CapacityExceeded {
        /// Configured station capacity.
        max: usize,
    },

    /// The reported station type is not a known type.
    #[error("Invalid station type: '{0}'. Expected 'sensor-node' or 'actuator-node'.")]
    InvalidType(String),

    /// No station with the given identifier is registered.
    #[error("Station not found: '{0}'")]
    StationNotFound(String),

    /// A required request parameter was missing or empty.
    #[error("Missing required parameter: {0}")]
    MissingParams(&'static str),

    // =========================================================================
    // COLLABORATOR & DISPATCH ERRORS
    // =========================================================================
    /// The code-generation collaborator failed.
    #[error("Code generation failed: {0}")]
    Ai(String),

    /// The station rejected the dispatched code or was unreachable.
    #[error("Execution failed on station '{mac}': {message}")]
    Execution {
        /// Target station identifier.
        mac: String,
        /// Device or transport error text.
        message: String,
    },

    /// A device or collaborator call exceeded its deadline.
    #[error("Timed out after {secs}s while {operation}")]
    Timeout {
        /// Deadline that was exceeded.
        secs: u64,
        /// Human-readable description of the operation.
        operation: &'static str,
    },

    // =========================================================================
    // CONFIGURATION & I/O ERRORS
    // =========================================================================
    /// The configuration file exists but could not be parsed or validated.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns `true` if this error is a registry invariant rejection.
    #[inline]
    #[must_use]
    pub const fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::InvalidType(_) | Self::StationNotFound(_)
        )
    }

    /// Returns `true` if this error came from a device dispatch.
    #[inline]
    #[must_use]
    pub const fn is_dispatch_error(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::Timeout { .. })
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invariant rejections and malformed input
            Self::CapacityExceeded { .. } | Self::InvalidType(_) | Self::MissingParams(_) => 400,

            // 404 Not Found
            Self::StationNotFound(_) => 404,

            // 500 Internal Server Error
            Self::Ai(_) | Self::Execution { .. } | Self::Config(_) | Self::Io(_) => 500,

            // 504 Gateway Timeout - the device or collaborator did not answer
            Self::Timeout { .. } => 504,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "CAPACITY_ERROR",
            Self::InvalidType(_) => "INVALID_TYPE",
            Self::StationNotFound(_) => "STATION_NOT_FOUND",
            Self::MissingParams(_) => "MISSING_PARAMS",
            Self::Ai(_) => "AI_ERROR",
            Self::Execution { .. } => "EXECUTION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<crate::config::ConfigError> for CoreError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_classification() {
        assert!(CoreError::CapacityExceeded { max: 2 }.is_registry_error());
        assert!(CoreError::InvalidType("relay".into()).is_registry_error());
        assert!(CoreError::StationNotFound("AA".into()).is_registry_error());

        assert!(!CoreError::Ai("overloaded".into()).is_registry_error());
    }

    #[test]
    fn test_dispatch_error_classification() {
        assert!(CoreError::Execution {
            mac: "AA".into(),
            message: "connection refused".into()
        }
        .is_dispatch_error());
        assert!(CoreError::Timeout {
            secs: 5,
            operation: "dispatching code"
        }
        .is_dispatch_error());

        assert!(!CoreError::StationNotFound("AA".into()).is_dispatch_error());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(CoreError::CapacityExceeded { max: 2 }.http_status_code(), 400);
        assert_eq!(CoreError::InvalidType("x".into()).http_status_code(), 400);
        assert_eq!(CoreError::StationNotFound("AA".into()).http_status_code(), 404);
        assert_eq!(CoreError::Ai("err".into()).http_status_code(), 500);
        assert_eq!(
            CoreError::Timeout {
                secs: 5,
                operation: "dispatching code"
            }
            .http_status_code(),
            504
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::CapacityExceeded { max: 2 }.error_code(),
            "CAPACITY_ERROR"
        );
        assert_eq!(CoreError::InvalidType("x".into()).error_code(), "INVALID_TYPE");
        assert_eq!(
            CoreError::StationNotFound("AA".into()).error_code(),
            "STATION_NOT_FOUND"
        );
        assert_eq!(CoreError::MissingParams("prompt").error_code(), "MISSING_PARAMS");
    }

    #[test]
    fn test_error_display_messages() {
        let err = CoreError::CapacityExceeded { max: 2 };
        assert!(err.to_string().contains("at most 2 stations"));

        let err = CoreError::StationNotFound("AABBCC".into());
        assert!(err.to_string().contains("AABBCC"));

        let err = CoreError::Timeout {
            secs: 20,
            operation: "waiting for device registration",
        };
        assert!(err.to_string().contains("waiting for device registration"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<CoreError>();
        assert_sync::<CoreError>();
    }
}
