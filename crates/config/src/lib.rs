use std::fs::{read_to_string, write};
use std::net::SocketAddr;

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use proofnet_network::config::{LimitsConfig, NetworkConfig, TimeoutConfig};
use proofnet_network::NodeConfig;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use serde::{Deserialize, Serialize};

pub mod dirs;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    pub identity: IdentityConfig,

    pub network: NetworkConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct IdentityConfig {
    pub node_id: NodeId,
}

impl IdentityConfig {
    #[must_use]
    pub const fn new(node_id: NodeId) -> Self {
        Self { node_id }
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        identity: IdentityConfig,
        network: NetworkConfig,
        timeouts: TimeoutConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            identity,
            network,
            timeouts,
            limits,
        }
    }

    /// Fresh configuration with a random node id and default timeouts.
    #[must_use]
    pub fn generate(gender: Gender, listen: Option<SocketAddr>, hooks: Vec<SocketAddr>) -> Self {
        Self::new(
            IdentityConfig::new(NodeId::random()),
            NetworkConfig::new(gender, listen, None, hooks),
            TimeoutConfig::default(),
            LimitsConfig::default(),
        )
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration in {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Only writes the file when its contents would change.
    pub fn save_if_changed(&self, dir: &Utf8Path) -> EyreResult<bool> {
        let path = dir.join(CONFIG_FILE);
        let new_content = toml::to_string_pretty(self)?;

        let changed = read_to_string(&path).map_or(true, |existing| existing != new_content);

        if changed {
            write(&path, new_content)
                .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;
        }

        Ok(changed)
    }

    #[must_use]
    pub fn to_node_config(&self) -> NodeConfig {
        NodeConfig::new(
            self.identity.node_id,
            self.network.clone(),
            self.timeouts,
            self.limits,
        )
    }
}

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;
