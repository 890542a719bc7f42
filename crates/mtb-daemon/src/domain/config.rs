//! Daemon configuration with validation.
//!
//! Loaded once at startup from a JSON file; the daemon never writes it back.

use mtb_types::ModuleAddress;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILENAME: &str = "mtb-daemon.json";

/// Default TCP port of the daemon.
pub const DEFAULT_PORT: u16 = 3841;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// TCP server configuration
    pub server: ServerConfig,
    /// Bus driver configuration
    pub bus: BusConfig,
    /// Modules seeded into the registry, keyed by address
    pub modules: BTreeMap<String, ModuleSeed>,
}

impl DaemonConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.server.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "event_queue_capacity cannot be 0".into(),
            ));
        }

        if self.bus.reactivate_period_ms == 0 {
            return Err(ConfigError::InvalidLimit(
                "reactivate_period_ms cannot be 0".into(),
            ));
        }

        self.seeded_modules()?;
        for module in &self.bus.simulated_modules {
            ModuleAddress::new(module.address)
                .map_err(|_| ConfigError::InvalidAddress(module.address.to_string()))?;
        }

        Ok(())
    }

    /// Seeded modules with parsed addresses, ascending.
    pub fn seeded_modules(&self) -> Result<Vec<(ModuleAddress, &ModuleSeed)>, ConfigError> {
        let mut seeds = self
            .modules
            .iter()
            .map(|(key, seed)| {
                key.parse::<i64>()
                    .ok()
                    .and_then(|raw| ModuleAddress::new(raw).ok())
                    .map(|addr| (addr, seed))
                    .ok_or_else(|| ConfigError::InvalidAddress(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        seeds.sort_by_key(|(addr, _)| *addr);
        Ok(seeds)
    }

    /// Get server bind address
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// TCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3841)
    pub port: u16,
    /// Longest accepted request line in bytes
    pub max_message_size: usize,
    /// Events buffered per client before it is disconnected
    pub event_queue_capacity: usize,
    /// Hosts allowed to change module state; absent means every host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_access: Option<Vec<IpAddr>>,
}

impl ServerConfig {
    /// Whether clients connecting from `host` may change module state.
    #[must_use]
    pub fn has_write_access(&self, host: IpAddr) -> bool {
        self.write_access
            .as_ref()
            .map_or(true, |hosts| hosts.contains(&host))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_message_size: 64 * 1024,
            event_queue_capacity: mtb_bus::DEFAULT_QUEUE_CAPACITY,
            write_access: None,
        }
    }
}

/// Default period of the inactive module reactivation pass.
pub const DEFAULT_REACTIVATE_PERIOD_MS: u64 = 500;

/// Bus driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Modules the loopback bus reports as present
    pub simulated_modules: Vec<SimulatedModule>,
    /// How often inactive modules are asked whether they answer again
    pub reactivate_period_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            simulated_modules: Vec::new(),
            reactivate_period_ms: DEFAULT_REACTIVATE_PERIOD_MS,
        }
    }
}

impl BusConfig {
    #[must_use]
    pub fn reactivate_period(&self) -> Duration {
        Duration::from_millis(self.reactivate_period_ms)
    }
}

/// A module present on the simulated bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedModule {
    pub address: i64,
    pub type_code: u8,
}

/// Module entry of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSeed {
    #[serde(rename = "type")]
    pub type_code: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Malformed config file: {0}")]
    Parse(String),
    #[error("Invalid module address in config: {0}")]
    InvalidAddress(String),
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}
