use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id minted by a broker for one splice attempt.
///
/// Both the requester and the target present it when claiming the raw
/// socket the broker pairs for them.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplicedConnectionId(Uuid);

impl SplicedConnectionId {
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_parts(most: u64, least: u64) -> Self {
        Self(Uuid::from_u64_pair(most, least))
    }

    #[must_use]
    pub const fn to_parts(self) -> (u64, u64) {
        self.0.as_u64_pair()
    }
}

impl fmt::Display for SplicedConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "splice-{}", self.0.simple())
    }
}
