//! Coordinator registry probe.
//!
//! After credentials are transferred the device reboots, joins the target
//! network, and registers itself with the coordinator. The provisioning
//! client confirms this by polling the coordinator's station list; the
//! query sits behind [`RegistryProbe`] so the session can be tested
//! without a running coordinator.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProvisionError;

/// Query surface into the coordinator's station registry.
#[async_trait]
pub trait RegistryProbe: Send + Sync {
    /// `true` when the station is registered and currently online.
    async fn station_online(&self, mac: &str) -> Result<bool, ProvisionError>;
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    stations: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    mac: String,
    status: String,
}

/// [`RegistryProbe`] over the coordinator's HTTP API.
pub struct HttpRegistryProbe {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryProbe {
    /// Build a probe against a coordinator base URL (e.g.
    /// `http://192.168.1.10:3000`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProvisionError::Probe(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryProbe for HttpRegistryProbe {
    async fn station_online(&self, mac: &str) -> Result<bool, ProvisionError> {
        let url = format!("{}/api/stations", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProvisionError::Probe(e.to_string()))?;
        let body: StationsResponse = response
            .json()
            .await
            .map_err(|e| ProvisionError::Probe(format!("malformed station list: {e}")))?;
        Ok(body
            .stations
            .iter()
            .any(|s| s.mac == mac && s.status == "online"))
    }
}
