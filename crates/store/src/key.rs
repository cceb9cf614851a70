use borsh::{BorshDeserialize, BorshSerialize};
use strum::{AsRefStr, EnumIter};

#[derive(Eq, Ord, Copy, Clone, Debug, Hash, PartialEq, PartialOrd, EnumIter, AsRefStr)]
pub enum Column {
    Hook,
    DeferredMessage,
    NodeDeferredMessage,
    /// Index over held deferred messages: `node | recipient | date | message`.
    DeferredByRecipient,
    /// Index over holders of a deferred message: `message | node`.
    DeferredHolders,
    Object,
    RootContext,
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Key {
    column: Column,
    bytes: Vec<u8>,
}

impl Key {
    #[must_use]
    pub const fn new(column: Column, bytes: Vec<u8>) -> Self {
        Self { column, bytes }
    }

    #[must_use]
    pub const fn column(&self) -> Column {
        self.column
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A persisted value living in one column, addressed by its id.
pub trait Entity: BorshSerialize + BorshDeserialize {
    const COLUMN: Column;

    type Id;

    fn id(&self) -> Self::Id;

    fn key_bytes(id: &Self::Id) -> Vec<u8>;

    fn key(id: &Self::Id) -> Key {
        Key::new(Self::COLUMN, Self::key_bytes(id))
    }
}

/// Concatenates fixed-width key components.
pub(crate) fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|part| part.len()).sum());

    for part in parts {
        key.extend_from_slice(part);
    }

    key
}

/// Encodes a signed timestamp so that byte order matches numeric order.
pub(crate) const fn sortable_i64(value: i64) -> [u8; 8] {
    #[expect(clippy::cast_sign_loss, reason = "bit reinterpretation")]
    let flipped = (value as u64) ^ (1 << 63);

    flipped.to_be_bytes()
}

pub(crate) fn from_sortable_i64(bytes: [u8; 8]) -> i64 {
    #[expect(clippy::cast_possible_wrap, reason = "bit reinterpretation")]
    let value = (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64;

    value
}
