//! Opaque persisted artifacts exchanged by persisted messages.
//!
//! The protocol engine never interprets object contents; it only stores them,
//! addresses them by digest, and resolves root contexts to their object.

use borsh::{BorshDeserialize, BorshSerialize};
use proofnet_primitives::context::ContextId;
use proofnet_primitives::hash::Hash;

use crate::key::{Column, Entity};
use crate::{StoreError, Transaction};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum ObjectKind {
    RootContext = 0,
    Person = 1,
    SignatureRequest = 2,
}

impl ObjectKind {
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RootContext),
            1 => Some(Self::Person),
            2 => Some(Self::SignatureRequest),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct StoredObject {
    kind: ObjectKind,
    data: Vec<u8>,
}

impl StoredObject {
    #[must_use]
    pub const fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn digest(&self) -> Hash {
        Hash::of_parts(&[&[self.kind.to_wire()], &self.data])
    }
}

impl Entity for StoredObject {
    const COLUMN: Column = Column::Object;

    type Id = Hash;

    fn id(&self) -> Self::Id {
        self.digest()
    }

    fn key_bytes(id: &Self::Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }
}

/// Resolves a root context id to the object holding its contents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct RootContextEntry {
    context: ContextId,
    object: Hash,
}

impl RootContextEntry {
    #[must_use]
    pub const fn object(&self) -> Hash {
        self.object
    }
}

impl Entity for RootContextEntry {
    const COLUMN: Column = Column::RootContext;

    type Id = ContextId;

    fn id(&self) -> Self::Id {
        self.context
    }

    fn key_bytes(id: &Self::Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }
}

/// Stores `object` unless an identical one is already present.
pub fn put(tx: &mut Transaction, object: &StoredObject) -> Result<Hash, StoreError> {
    let id = object.digest();

    if !tx.contains::<StoredObject>(&id)? {
        tx.put(object)?;
    }

    Ok(id)
}

pub fn get(tx: &mut Transaction, id: Hash) -> Result<Option<StoredObject>, StoreError> {
    tx.get::<StoredObject>(&id)
}

/// Stores `data` as the contents of root context `context`.
pub fn publish_root_context(
    tx: &mut Transaction,
    context: ContextId,
    data: Vec<u8>,
) -> Result<Hash, StoreError> {
    let object = put(tx, &StoredObject::new(ObjectKind::RootContext, data))?;

    tx.put(&RootContextEntry { context, object })?;

    Ok(object)
}

pub fn find_root_context(
    tx: &mut Transaction,
    context: ContextId,
) -> Result<Option<StoredObject>, StoreError> {
    let Some(entry) = tx.get::<RootContextEntry>(&context)? else {
        return Ok(None);
    };

    get(tx, entry.object)
}
