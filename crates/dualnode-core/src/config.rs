//! Coordinator configuration management.
//!
//! Handles loading, saving, and validating dualnode configuration including:
//! - HTTP listen port
//! - Station capacity and liveness thresholds
//! - Telemetry and command history bounds
//! - Code-generation collaborator endpoint and model

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file exists but is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds a value outside its valid range.
    #[error("Invalid configuration: {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Station registry and liveness settings.
    pub registry: RegistryConfig,

    /// Telemetry retention settings.
    pub telemetry: TelemetryConfig,

    /// Command history and dispatch settings.
    pub commands: CommandsConfig,

    /// Code-generation collaborator settings.
    pub ai: AiConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
}

/// Station registry and liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of registered stations.
    pub max_stations: usize,

    /// Seconds without a heartbeat before a station is considered offline.
    pub offline_threshold_secs: u64,

    /// Seconds between presence sweeps.
    pub sweep_interval_secs: u64,

    /// Seconds to wait after a reset before removing the station.
    pub reset_grace_secs: u64,
}

/// Telemetry retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Number of readings retained per station.
    pub history_capacity: usize,
}

/// Command history and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Number of commands retained per station.
    pub history_capacity: usize,

    /// Seconds before a code dispatch to a station times out.
    pub dispatch_timeout_secs: u64,

    /// Seconds before a liveness ping times out.
    pub ping_timeout_secs: u64,
}

/// Code-generation collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the OpenAI-compatible chat-completions endpoint.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// API key. Empty disables the collaborator.
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_stations: 2,
            offline_threshold_secs: 10,
            sweep_interval_secs: 30,
            reset_grace_secs: 5,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            dispatch_timeout_secs: 5,
            ping_timeout_secs: 2,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            registry: RegistryConfig::default(),
            telemetry: TelemetryConfig::default(),
            commands: CommandsConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default configuration file path.
    ///
    /// On Linux deployments: `/etc/dualnode/config.toml`.
    /// For development: the platform config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/dualnode/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "dualnode")
                .map_or_else(|| PathBuf::from("config.toml"), |d| d.config_dir().join("config.toml"))
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.registry.max_stations == 0 {
            return Err(ConfigError::Validation {
                field: "registry.max_stations",
                message: "must be at least 1".to_string(),
            });
        }
        if self.registry.offline_threshold_secs == 0 {
            return Err(ConfigError::Validation {
                field: "registry.offline_threshold_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.telemetry.history_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "telemetry.history_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        if self.commands.history_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "commands.history_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
