//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via HERMODR_CONFIG)
//! 3. Environment variables

use hermodr_protocol::{DEFAULT_PORT, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Connection and frame limits.
    pub limits: LimitsConfig,
    /// World served by the standalone binary.
    pub world: WorldConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("HERMODR_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.limits.apply_env_overrides();
        self.world.apply_env_overrides();
    }

    /// Checks values that deserialize fine but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.host.is_empty() {
            return Err(ConfigError::Invalid("network.host must not be empty".to_string()));
        }
        if self.limits.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_connections must be at least 1".to_string(),
            ));
        }
        if self.limits.max_payload_bytes > i32::MAX as u32 {
            return Err(ConfigError::Invalid(format!(
                "limits.max_payload_bytes must not exceed {}",
                i32::MAX
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host name or IP literal to bind; names are resolved at startup.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("HERMODR_BIND") {
            match split_host_port(&bind) {
                Some((host, port)) => {
                    self.host = host.to_string();
                    self.port = port;
                }
                None => tracing::warn!("Ignoring HERMODR_BIND={:?}: expected host:port", bind),
            }
        }
    }

    /// Resolves `host:port` to the address to bind, taking the first match.
    pub async fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        let target = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| ConfigError::Resolve {
                target: target.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| ConfigError::Resolve {
            target,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        })
    }
}

/// Splits `host:port`, accepting bracketed IPv6 hosts.
fn split_host_port(bind: &str) -> Option<(&str, u16)> {
    let (host, port) = bind.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

/// Connection and frame limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest payload accepted or sent, in bytes.
    pub max_payload_bytes: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            max_payload_bytes: MAX_PAYLOAD_SIZE,
        }
    }
}

impl LimitsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("HERMODR_MAX_CONNECTIONS") {
            match max.parse() {
                Ok(n) => self.max_connections = n,
                Err(_) => tracing::warn!("Ignoring HERMODR_MAX_CONNECTIONS={:?}", max),
            }
        }

        if let Ok(max) = std::env::var("HERMODR_MAX_PAYLOAD") {
            match max.parse() {
                Ok(n) => self.max_payload_bytes = n,
                Err(_) => tracing::warn!("Ignoring HERMODR_MAX_PAYLOAD={:?}", max),
            }
        }
    }
}

/// World configuration for the standalone binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Name reported by the `WorldName` and `Status` ops.
    pub name: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "Dedicated".to_string(),
        }
    }
}

impl WorldConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("HERMODR_WORLD_NAME") {
            if !name.is_empty() {
                self.name = name;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to resolve bind address '{target}': {source}")]
    Resolve {
        target: String,
        #[source]
        source: std::io::Error,
    },
}
