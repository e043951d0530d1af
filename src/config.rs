//! Configuration management for itemchain

use crate::error::ChainError;
use crate::network::Peer;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "itemchain.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Interface the membership and replication servers bind to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Address peers should use to reach this node. Detected when unset.
    #[serde(default)]
    pub advertise_host: Option<String>,
    /// Membership port; replication endpoints listen on `base_port + 1`.
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// `host:port` of an existing member. Unset means this node starts the network.
    #[serde(default)]
    pub join: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            advertise_host: None,
            base_port: default_base_port(),
            join: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The member to join through, if any.
    pub fn join_peer(&self) -> Result<Option<Peer>, ChainError> {
        self.join.as_deref().map(Peer::parse).transpose()
    }
}

impl Config {
    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.node.name.trim().is_empty() {
            return Err(ChainError::ConfigError("node.name must not be empty".to_string()));
        }
        if self.network.base_port == 0 || self.network.base_port == u16::MAX {
            return Err(ChainError::ConfigError(format!(
                "network.base_port must be between 1 and {}, replication uses base_port + 1",
                u16::MAX - 1
            )));
        }
        if self.network.request_timeout_secs == 0 {
            return Err(ChainError::ConfigError(
                "network.request_timeout_secs must be positive".to_string(),
            ));
        }
        self.network.join_peer()?;
        Ok(())
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config, ChainError> {
    let config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

fn default_node_name() -> String {
    "itemchain-node".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_base_port() -> u16 {
    7000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
