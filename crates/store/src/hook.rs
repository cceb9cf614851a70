//! Remembered bootstrap addresses.

use core::cmp::Ordering;
use std::io;
use std::net::SocketAddr;

use borsh::{BorshDeserialize, BorshSerialize};
use proofnet_primitives::hash::Hash;
use proofnet_primitives::time::DAY_MILLIS;

use crate::key::{Column, Entity};
use crate::{StoreError, Transaction};

/// Synthetic id derived from the hook's socket address.
pub type HookId = Hash;

#[must_use]
pub fn hook_id(address: &SocketAddr) -> HookId {
    Hash::new(address.to_string().as_bytes())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hook {
    address: SocketAddr,
    last_success_millis: i64,
    failed_attempts: u32,
}

impl Hook {
    #[must_use]
    pub const fn new(address: SocketAddr) -> Self {
        Self {
            address,
            last_success_millis: 0,
            failed_attempts: 0,
        }
    }

    #[must_use]
    pub const fn with_history(
        address: SocketAddr,
        last_success_millis: i64,
        failed_attempts: u32,
    ) -> Self {
        Self {
            address,
            last_success_millis,
            failed_attempts,
        }
    }

    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    #[must_use]
    pub const fn last_success_millis(&self) -> i64 {
        self.last_success_millis
    }

    #[must_use]
    pub const fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Lower sorts first: recent successes pull a hook forward, every failed
    /// attempt pushes it back by one day.
    #[must_use]
    pub const fn priority(&self) -> i64 {
        let penalty = (self.failed_attempts as i64).saturating_mul(DAY_MILLIS);

        self.last_success_millis.saturating_neg().saturating_add(penalty)
    }

    pub fn record_success(&mut self, now_millis: i64) {
        self.last_success_millis = now_millis;
        self.failed_attempts = 0;
    }

    pub fn record_failure(&mut self) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
    }

    /// Keeps the most recent success seen by either side, used when merging
    /// hooks learned from a peer.
    pub fn merge_success(&mut self, last_success_millis: i64) {
        self.last_success_millis = self.last_success_millis.max(last_success_millis);
    }

    fn cmp_priority(&self, other: &Self) -> Ordering {
        self.priority()
            .cmp(&other.priority())
            .then_with(|| self.address.cmp(&other.address))
    }
}

impl BorshSerialize for Hook {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.address.to_string().serialize(writer)?;
        self.last_success_millis.serialize(writer)?;
        self.failed_attempts.serialize(writer)
    }
}

impl BorshDeserialize for Hook {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let address = String::deserialize_reader(reader)?
            .parse()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        Ok(Self {
            address,
            last_success_millis: i64::deserialize_reader(reader)?,
            failed_attempts: u32::deserialize_reader(reader)?,
        })
    }
}

impl Entity for Hook {
    const COLUMN: Column = Column::Hook;

    type Id = HookId;

    fn id(&self) -> Self::Id {
        hook_id(&self.address)
    }

    fn key_bytes(id: &Self::Id) -> Vec<u8> {
        id.as_bytes().to_vec()
    }
}

/// Every hook, best candidate first.
pub fn by_priority(tx: &mut Transaction) -> Result<Vec<Hook>, StoreError> {
    let mut hooks = tx.scan::<Hook>(&[])?;

    hooks.sort_by(Hook::cmp_priority);

    Ok(hooks)
}

/// Returns the stored hook for `address`, creating a fresh one if needed.
pub fn touch(tx: &mut Transaction, address: SocketAddr) -> Result<Hook, StoreError> {
    if let Some(hook) = tx.get::<Hook>(&hook_id(&address))? {
        return Ok(hook);
    }

    let hook = Hook::new(address);
    tx.put(&hook)?;

    Ok(hook)
}

pub fn record_success(
    tx: &mut Transaction,
    address: SocketAddr,
    now_millis: i64,
) -> Result<Hook, StoreError> {
    let mut hook = touch(tx, address)?;
    hook.record_success(now_millis);
    tx.put(&hook)?;

    Ok(hook)
}

pub fn record_failure(tx: &mut Transaction, address: SocketAddr) -> Result<Hook, StoreError> {
    let mut hook = touch(tx, address)?;
    hook.record_failure();
    tx.put(&hook)?;

    Ok(hook)
}

/// Administrative clear, returning how many hooks were removed.
pub fn clear(tx: &mut Transaction) -> Result<usize, StoreError> {
    let hooks = tx.scan::<Hook>(&[])?;

    for hook in &hooks {
        tx.delete::<Hook>(&hook.id());
    }

    Ok(hooks.len())
}

#[cfg(test)]
#[path = "tests/hook.rs"]
mod tests;
