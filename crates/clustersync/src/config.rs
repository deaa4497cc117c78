//! Node configuration.

use serde::{Deserialize, Serialize};

use clustersync_rpc::{ClientConfig, ServerRole};
use clustersync_sync::SyncConfig;

use crate::error::{NodeError, Result};

/// Configuration for a [`SyncNode`](crate::SyncNode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Role of the servers this node calls for sync data.
    pub role: ServerRole,
    /// RPC client settings.
    pub client: ClientConfig,
    /// Sync task settings.
    pub sync: SyncConfig,
    /// Slaves that must hold a root block's shard blocks before it is
    /// committed. Empty disables the check.
    pub slave_endpoints: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: ServerRole::Slave,
            client: ClientConfig::default(),
            sync: SyncConfig::default(),
            slave_endpoints: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NodeConfig =
            serde_json::from_str(json).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.client.timeout.is_zero() {
            return Err(NodeError::Config("client timeout must be non-zero".into()));
        }
        for endpoint in &self.slave_endpoints {
            if !is_endpoint(endpoint) {
                return Err(NodeError::Config(format!(
                    "slave endpoint {:?} is not host:port",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

fn is_endpoint(endpoint: &str) -> bool {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
