//! Process-wide table of message codecs.

use core::fmt;

use proofnet_primitives::version::{ProtocolVersion, VersionSet};
use proofnet_store::Transaction;
use strum::IntoEnumIterator;

use crate::buf::WireReader;
use crate::code::MessageCode;
use crate::message::{Message, REGISTRATIONS};
use crate::payload::{PersistedPayload, PlainPayload};
use crate::WireError;

pub type PlainDecodeFn = fn(&mut WireReader<'_>, ProtocolVersion) -> Result<Message, WireError>;
pub type PersistedDecodeFn =
    fn(&mut WireReader<'_>, ProtocolVersion, &mut Transaction) -> Result<Message, WireError>;
pub type SkipFn = fn(&mut WireReader<'_>, ProtocolVersion) -> Result<(), WireError>;

#[derive(Clone, Copy)]
pub enum DecodeFn {
    Plain(PlainDecodeFn),
    Persisted(PersistedDecodeFn),
}

impl fmt::Debug for DecodeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Persisted(_) => f.write_str("Persisted"),
        }
    }
}

/// One entry of the registry: a code and its sub-codec.
#[derive(Clone, Copy)]
pub struct Registration {
    code: MessageCode,
    versions: VersionSet,
    decode: DecodeFn,
    skip: SkipFn,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("code", &self.code)
            .field("versions", &self.versions)
            .field("persisted", &self.is_persisted())
            .finish_non_exhaustive()
    }
}

impl Registration {
    #[must_use]
    pub const fn plain<P: PlainPayload>() -> Self {
        Self {
            code: P::CODE,
            versions: P::VERSIONS,
            decode: DecodeFn::Plain(decode_plain::<P>),
            skip: P::skip,
        }
    }

    #[must_use]
    pub const fn persisted<P: PersistedPayload>() -> Self {
        Self {
            code: P::CODE,
            versions: P::VERSIONS,
            decode: DecodeFn::Persisted(decode_persisted::<P>),
            skip: P::skip,
        }
    }

    #[must_use]
    pub const fn code(&self) -> MessageCode {
        self.code
    }

    #[must_use]
    pub const fn versions(&self) -> VersionSet {
        self.versions
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self.decode, DecodeFn::Persisted(_))
    }

    /// Version used before the connection has negotiated one.
    #[must_use]
    pub const fn initial_version(&self) -> Option<ProtocolVersion> {
        self.versions.lowest()
    }

    pub fn decode(
        &self,
        r: &mut WireReader<'_>,
        version: ProtocolVersion,
        tx: Option<&mut Transaction>,
    ) -> Result<Message, WireError> {
        match (self.decode, tx) {
            (DecodeFn::Plain(decode), _) => decode(r, version),
            (DecodeFn::Persisted(decode), Some(tx)) => decode(r, version, tx),
            (DecodeFn::Persisted(_), None) => Err(WireError::MissingTransaction(self.code)),
        }
    }

    pub fn skip(&self, r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<(), WireError> {
        (self.skip)(r, version)
    }
}

fn decode_plain<P: PlainPayload>(
    r: &mut WireReader<'_>,
    version: ProtocolVersion,
) -> Result<Message, WireError> {
    P::decode(r, version).map(Into::into)
}

fn decode_persisted<P: PersistedPayload>(
    r: &mut WireReader<'_>,
    version: ProtocolVersion,
    tx: &mut Transaction,
) -> Result<Message, WireError> {
    P::decode(r, version, tx).map(Into::into)
}

#[must_use]
pub fn registrations() -> &'static [Registration] {
    REGISTRATIONS
}

/// Resolves a raw wire code.
pub fn lookup(wire: u16) -> Result<&'static Registration, WireError> {
    REGISTRATIONS
        .iter()
        .find(|entry| entry.code.to_wire() == wire)
        .ok_or(WireError::UnknownCode(wire))
}

/// Sub-codec for `code` at `version`, failing when the kind does not
/// support that version.
pub fn codec(
    code: MessageCode,
    version: ProtocolVersion,
) -> Result<&'static Registration, WireError> {
    let entry = lookup(code.to_wire())?;

    if !entry.versions.contains(version) {
        return Err(WireError::UnsupportedVersion { code, version });
    }

    Ok(entry)
}

/// Checks that every code is registered exactly once with a usable
/// version set. Run once before any connection is accepted.
pub fn validate() -> Result<(), WireError> {
    for code in MessageCode::iter() {
        let mut entries = REGISTRATIONS.iter().filter(|entry| entry.code == code);

        let Some(entry) = entries.next() else {
            return Err(WireError::InvalidRegistry {
                code,
                reason: "not registered",
            });
        };

        if entries.next().is_some() {
            return Err(WireError::InvalidRegistry {
                code,
                reason: "registered more than once",
            });
        }

        if entry.versions.is_empty() {
            return Err(WireError::InvalidRegistry {
                code,
                reason: "supports no protocol version",
            });
        }

        if entry.versions.intersection(VersionSet::ALL) != entry.versions {
            return Err(WireError::InvalidRegistry {
                code,
                reason: "declares an unknown protocol version",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/registry.rs"]
mod tests;
