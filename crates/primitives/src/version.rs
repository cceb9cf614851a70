#[cfg(test)]
#[path = "tests/version.rs"]
mod tests;

use core::fmt;

use serde::{Deserialize, Serialize};

/// A protocol version number negotiated once per connection.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u16);

impl ProtocolVersion {
    pub const V1: Self = Self(1);
    /// Adds connection splicing and hook timestamps.
    pub const V2: Self = Self(2);

    pub const LATEST: Self = Self::V2;

    #[must_use]
    pub const fn new(version: u16) -> Self {
        Self(version)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A set of protocol versions, stored as a bitmask over versions `1..=32`.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ProtocolVersion>", into = "Vec<ProtocolVersion>")]
pub struct VersionSet {
    bits: u32,
}

impl VersionSet {
    pub const EMPTY: Self = Self { bits: 0 };
    pub const ALL: Self = Self::of(&[ProtocolVersion::V1, ProtocolVersion::V2]);
    pub const SINCE_V2: Self = Self::of(&[ProtocolVersion::V2]);

    /// Versions outside `1..=32` are ignored.
    #[must_use]
    pub const fn of(versions: &[ProtocolVersion]) -> Self {
        let mut bits = 0_u32;
        let mut i = 0;

        while i < versions.len() {
            let version = versions[i].0;
            if version >= 1 && version <= 32 {
                bits |= 1 << (version - 1);
            }
            i += 1;
        }

        Self { bits }
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    #[must_use]
    pub const fn contains(self, version: ProtocolVersion) -> bool {
        version.0 >= 1 && version.0 <= 32 && self.bits & (1 << (version.0 - 1)) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    #[must_use]
    pub const fn highest(self) -> Option<ProtocolVersion> {
        if self.bits == 0 {
            return None;
        }

        #[expect(clippy::cast_possible_truncation, reason = "at most 32")]
        let version = (32 - self.bits.leading_zeros()) as u16;

        Some(ProtocolVersion(version))
    }

    #[must_use]
    pub const fn lowest(self) -> Option<ProtocolVersion> {
        if self.bits == 0 {
            return None;
        }

        #[expect(clippy::cast_possible_truncation, reason = "at most 32")]
        let version = (self.bits.trailing_zeros() + 1) as u16;

        Some(ProtocolVersion(version))
    }

    /// The version both ends will speak: the highest one they share.
    #[must_use]
    pub const fn negotiate(self, other: Self) -> Option<ProtocolVersion> {
        self.intersection(other).highest()
    }

    pub fn iter(self) -> impl Iterator<Item = ProtocolVersion> {
        (1..=32_u16)
            .map(ProtocolVersion)
            .filter(move |version| self.contains(*version))
    }
}

impl From<Vec<ProtocolVersion>> for VersionSet {
    fn from(versions: Vec<ProtocolVersion>) -> Self {
        Self::of(&versions)
    }
}

impl From<VersionSet> for Vec<ProtocolVersion> {
    fn from(set: VersionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
