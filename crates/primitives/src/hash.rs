#[cfg(test)]
#[path = "tests/hash.rs"]
mod tests;

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// SHA-256 digest used to content-address persisted entities.
#[derive(
    Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct Hash {
    bytes: [u8; BYTES_LEN],
}

impl Hash {
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: Sha256::digest(data).into(),
        }
    }

    /// Digest over several fields, each prefixed by its length so that
    /// adjacent fields cannot be shifted into one another.
    #[must_use]
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::default();

        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }

        Self {
            bytes: hasher.finalize().into(),
        }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.bytes
    }

    #[must_use]
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }
}

impl From<[u8; BYTES_LEN]> for Hash {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self { bytes }
    }
}

impl From<Hash> for [u8; BYTES_LEN] {
    fn from(hash: Hash) -> Self {
        hash.bytes
    }
}

impl Deref for Hash {
    type Target = [u8; BYTES_LEN];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_base58()).finish()
    }
}

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum HashError {
    #[error("invalid base58: {0}")]
    DecodeError(#[from] bs58::decode::Error),
    #[error("invalid length, expected {BYTES_LEN} bytes")]
    InvalidLength,
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES_LEN];

        match bs58::decode(s).onto(&mut bytes) {
            Ok(len) if len == BYTES_LEN => Ok(Self { bytes }),
            Ok(_) => Err(HashError::InvalidLength),
            Err(err) => Err(err.into()),
        }
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = <String as Deserialize>::deserialize(deserializer)?;

        encoded.parse().map_err(serde::de::Error::custom)
    }
}
