use core::time::Duration;
use std::net::SocketAddr;

use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::time::DAY_MILLIS;
use proofnet_primitives::version::VersionSet;
use proofnet_wire::Limits;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 7640;

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub network: NetworkConfig,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
}

impl NodeConfig {
    #[must_use]
    pub const fn new(
        node_id: NodeId,
        network: NetworkConfig,
        timeouts: TimeoutConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            node_id,
            network,
            timeouts,
            limits,
        }
    }

    #[must_use]
    pub fn local(node_id: NodeId, gender: Gender) -> Self {
        let listen = match gender {
            Gender::Female => Some(SocketAddr::from(([127, 0, 0, 1], 0))),
            Gender::Male => None,
        };

        Self::new(
            node_id,
            NetworkConfig::new(gender, listen, None, Vec::new()),
            TimeoutConfig::default(),
            LimitsConfig::default(),
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct NetworkConfig {
    pub gender: Gender,
    /// Where a Female node accepts connections.
    #[serde(default)]
    pub listen: Option<SocketAddr>,
    /// Address announced to peers, when it differs from `listen`.
    #[serde(default)]
    pub public_address: Option<SocketAddr>,
    /// Bootstrap addresses seeded into the hook list on start.
    #[serde(default)]
    pub hooks: Vec<SocketAddr>,
    #[serde(default = "default_versions")]
    pub versions: VersionSet,
}

impl NetworkConfig {
    #[must_use]
    pub const fn new(
        gender: Gender,
        listen: Option<SocketAddr>,
        public_address: Option<SocketAddr>,
        hooks: Vec<SocketAddr>,
    ) -> Self {
        Self {
            gender,
            listen,
            public_address,
            hooks,
            versions: VersionSet::ALL,
        }
    }
}

const fn default_versions() -> VersionSet {
    VersionSet::ALL
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct TimeoutConfig {
    /// Budget for every single wait inside a dialog.
    #[serde(rename = "dialog_ms", with = "serde_duration")]
    pub dialog: Duration,
    #[serde(rename = "connect_ms", with = "serde_duration")]
    pub connect: Duration,
    /// How long a quiet connection waits before exchanging idle proposals.
    #[serde(rename = "idle_interval_ms", with = "serde_duration")]
    pub idle_interval: Duration,
    /// Lifetime of a splice slot that has not been claimed by both ends.
    #[serde(rename = "splice_ttl_ms", with = "serde_duration")]
    pub splice_ttl: Duration,
    #[serde(rename = "maintenance_interval_ms", with = "serde_duration")]
    pub maintenance_interval: Duration,
    /// Age after which undelivered deferred messages are dropped.
    #[serde(rename = "deferred_ttl_ms", with = "serde_duration")]
    pub deferred_ttl: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dialog: Duration::from_secs(10),
            connect: Duration::from_secs(5),
            idle_interval: Duration::from_secs(30),
            splice_ttl: Duration::from_secs(30),
            maintenance_interval: Duration::from_secs(10),
            deferred_ttl: Duration::from_millis(7 * DAY_MILLIS.unsigned_abs()),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct LimitsConfig {
    pub max_frame_len: u32,
    pub max_array_len: u32,
    /// Outstanding node requests queued per connection.
    pub request_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let wire = Limits::default();

        Self {
            max_frame_len: wire.max_frame_len,
            max_array_len: wire.max_array_len,
            request_queue: 32,
        }
    }
}

impl LimitsConfig {
    #[must_use]
    pub const fn wire(&self) -> Limits {
        Limits {
            max_frame_len: self.max_frame_len,
            max_array_len: self.max_array_len,
        }
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;
