//! Store-and-forward payloads for recipients that are not reachable.
//!
//! A [`DeferredMessage`] lives as long as at least one node holds it. Each
//! holding is a [`NodeDeferredMessage`] plus two index rows: one ordered by
//! `(node, recipient, date)` for delivery and expiry scans, and one by
//! `(message, node)` to find out whether anyone still holds a message.

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use proofnet_primitives::hash::Hash;
use proofnet_primitives::identity::NodeId;
use tracing::debug;

use crate::key::{concat, from_sortable_i64, sortable_i64, Column, Entity, Key};
use crate::{StoreError, Transaction};

const NODE_LEN: usize = 16;
const DATE_LEN: usize = 8;
const HASH_LEN: usize = 32;

/// What a deferred payload carries once it reaches its recipient.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum DeferredKind {
    SignatureRequest = 0,
    Persons = 1,
}

impl DeferredKind {
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SignatureRequest),
            1 => Some(Self::Persons),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct DeferredMessage {
    recipient: NodeId,
    date: i64,
    kind: DeferredKind,
    content: Vec<u8>,
}

impl DeferredMessage {
    #[must_use]
    pub const fn new(recipient: NodeId, date: i64, kind: DeferredKind, content: Vec<u8>) -> Self {
        Self {
            recipient,
            date,
            kind,
            content,
        }
    }

    #[must_use]
    pub const fn recipient(&self) -> NodeId {
        self.recipient
    }

    #[must_use]
    pub const fn date(&self) -> i64 {
        self.date
    }

    #[must_use]
    pub const fn kind(&self) -> DeferredKind {
        self.kind
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content address: digest of recipient, date and content.
    #[must_use]
    pub fn digest(&self) -> Hash {
        Hash::of_parts(&[
            self.recipient.as_bytes(),
            &self.date.to_be_bytes(),
            &self.content,
        ])
    }
}

impl Entity for DeferredMessage {
    const COLUMN: Column = Column::DeferredMessage;

    type Id = Hash;

    fn id(&self) -> Self::Id {
        self.digest()
    }

    fn key_bytes(id: &Self::Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }
}

/// Records that `node` currently carries a copy of `message`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct NodeDeferredMessage {
    node: NodeId,
    message: Hash,
    recipient: NodeId,
    date: i64,
}

impl NodeDeferredMessage {
    #[must_use]
    pub fn new(node: NodeId, message: &DeferredMessage) -> Self {
        Self {
            node,
            message: message.digest(),
            recipient: message.recipient,
            date: message.date,
        }
    }

    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub const fn message(&self) -> Hash {
        self.message
    }

    #[must_use]
    pub const fn recipient(&self) -> NodeId {
        self.recipient
    }

    #[must_use]
    pub const fn date(&self) -> i64 {
        self.date
    }

    fn by_recipient_key(&self) -> Key {
        Key::new(
            Column::DeferredByRecipient,
            concat(&[
                self.node.as_bytes(),
                self.recipient.as_bytes(),
                &sortable_i64(self.date),
                self.message.as_bytes(),
            ]),
        )
    }

    fn holder_key(&self) -> Key {
        Key::new(
            Column::DeferredHolders,
            concat(&[self.message.as_bytes(), self.node.as_bytes()]),
        )
    }
}

impl Entity for NodeDeferredMessage {
    const COLUMN: Column = Column::NodeDeferredMessage;

    type Id = (NodeId, Hash);

    fn id(&self) -> Self::Id {
        (self.node, self.message)
    }

    fn key_bytes((node, message): &Self::Id) -> Vec<u8> {
        concat(&[node.as_bytes(), message.as_bytes()])
    }
}

/// Stores `message` and a holding for each of `holders`.
///
/// With no holders the message is stored alone; the first
/// [`delete_if_no_nodes`] that runs over it removes it.
pub fn create(
    tx: &mut Transaction,
    message: &DeferredMessage,
    holders: &[NodeId],
) -> Result<Hash, StoreError> {
    tx.put(message)?;

    for node in holders {
        let _holding = hold(tx, *node, message)?;
    }

    Ok(message.digest())
}

/// Makes `node` a holder of `message`, storing the message if it is new.
pub fn hold(
    tx: &mut Transaction,
    node: NodeId,
    message: &DeferredMessage,
) -> Result<NodeDeferredMessage, StoreError> {
    if !tx.contains::<DeferredMessage>(&message.digest())? {
        tx.put(message)?;
    }

    let holding = NodeDeferredMessage::new(node, message);

    tx.put(&holding)?;
    tx.put_raw(holding.by_recipient_key(), Vec::new());
    tx.put_raw(holding.holder_key(), Vec::new());

    Ok(holding)
}

/// Drops `node`'s holding of `message` and deletes the message itself when
/// that was the last holding. Returns whether the message was deleted.
pub fn release(tx: &mut Transaction, node: NodeId, message: Hash) -> Result<bool, StoreError> {
    let Some(holding) = tx.get::<NodeDeferredMessage>(&(node, message))? else {
        return delete_if_no_nodes(tx, message);
    };

    tx.delete::<NodeDeferredMessage>(&holding.id());
    tx.delete_raw(holding.by_recipient_key());
    tx.delete_raw(holding.holder_key());

    delete_if_no_nodes(tx, message)
}

/// Deletes `message` when no node holds it any more.
pub fn delete_if_no_nodes(tx: &mut Transaction, message: Hash) -> Result<bool, StoreError> {
    if !holders(tx, message)?.is_empty() {
        return Ok(false);
    }

    if !tx.contains::<DeferredMessage>(&message)? {
        return Ok(false);
    }

    tx.delete::<DeferredMessage>(&message);
    debug!(%message, "deleted deferred message without holders");

    Ok(true)
}

/// Deletes every stored message no node holds. Returns how many went.
pub fn purge_orphans(tx: &mut Transaction) -> Result<usize, StoreError> {
    let ids: Vec<_> = tx
        .scan_raw(Column::DeferredMessage, &[])?
        .into_iter()
        .filter_map(|(key, _)| hash_at(&key, 0))
        .collect();
    let mut purged = 0;

    for id in ids {
        if delete_if_no_nodes(tx, id)? {
            purged += 1;
        }
    }

    Ok(purged)
}

pub fn holders(tx: &mut Transaction, message: Hash) -> Result<Vec<NodeId>, StoreError> {
    Ok(tx
        .scan_raw(Column::DeferredHolders, message.as_bytes())?
        .into_iter()
        .filter_map(|(key, _)| node_at(&key, HASH_LEN))
        .collect())
}

/// Everything `node` holds, in message-id order.
pub fn held_by(tx: &mut Transaction, node: NodeId) -> Result<Vec<NodeDeferredMessage>, StoreError> {
    tx.scan::<NodeDeferredMessage>(node.as_bytes())
}

/// What `node` holds for `recipient`, oldest first.
pub fn held_for(
    tx: &mut Transaction,
    node: NodeId,
    recipient: NodeId,
) -> Result<Vec<NodeDeferredMessage>, StoreError> {
    let prefix = concat(&[node.as_bytes(), recipient.as_bytes()]);
    let mut holdings = Vec::new();

    for (key, _) in tx.scan_raw(Column::DeferredByRecipient, &prefix)? {
        let Some(message) = hash_at(&key, NODE_LEN * 2 + DATE_LEN) else {
            continue;
        };

        if let Some(holding) = tx.get::<NodeDeferredMessage>(&(node, message))? {
            holdings.push(holding);
        }
    }

    Ok(holdings)
}

/// Recipients `node` holds at least one message for.
pub fn recipients(tx: &mut Transaction, node: NodeId) -> Result<BTreeSet<NodeId>, StoreError> {
    Ok(held_by(tx, node)?
        .into_iter()
        .map(|holding| holding.recipient)
        .collect())
}

/// Releases every holding of `node` for `recipient` dated strictly before
/// `before`. Returns the number of holdings released.
pub fn expire(
    tx: &mut Transaction,
    node: NodeId,
    recipient: NodeId,
    before: i64,
) -> Result<usize, StoreError> {
    let prefix = concat(&[node.as_bytes(), recipient.as_bytes()]);
    let mut expired = Vec::new();

    for (key, _) in tx.scan_raw(Column::DeferredByRecipient, &prefix)? {
        let Some(date) = date_at(&key, NODE_LEN * 2) else {
            continue;
        };

        if date >= before {
            break;
        }

        if let Some(message) = hash_at(&key, NODE_LEN * 2 + DATE_LEN) {
            expired.push(message);
        }
    }

    for message in &expired {
        let _deleted = release(tx, node, *message)?;
    }

    Ok(expired.len())
}

fn node_at(key: &[u8], offset: usize) -> Option<NodeId> {
    let bytes: [u8; NODE_LEN] = key.get(offset..offset + NODE_LEN)?.try_into().ok()?;
    let most = u64::from_be_bytes(bytes[..8].try_into().ok()?);
    let least = u64::from_be_bytes(bytes[8..].try_into().ok()?);

    Some(NodeId::from_parts(most, least))
}

fn hash_at(key: &[u8], offset: usize) -> Option<Hash> {
    let bytes: [u8; HASH_LEN] = key.get(offset..offset + HASH_LEN)?.try_into().ok()?;

    Some(Hash::from(bytes))
}

fn date_at(key: &[u8], offset: usize) -> Option<i64> {
    let bytes: [u8; DATE_LEN] = key.get(offset..offset + DATE_LEN)?.try_into().ok()?;

    Some(from_sortable_i64(bytes))
}

#[cfg(test)]
#[path = "tests/deferred.rs"]
mod tests;
