//! Transactional entity storage used by the protocol engine.
//!
//! The store is an ordered key-value map split into [`Column`]s. Every
//! mutation goes through a [`Transaction`]: writes are buffered, reads record
//! the version they observed, and [`Transaction::commit`] applies the writes
//! atomically after checking that nothing it read has changed since.
//! Listeners registered with [`Store::subscribe`] are called synchronously
//! with the committed changes.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::trace;

pub mod deferred;
pub mod hook;
pub mod key;
pub mod listener;
pub mod object;
mod tx;

pub use key::{Column, Entity, Key};
pub use listener::{Change, ChangeKind, StoreListener};
pub use tx::{Operation, Transaction};

/// How many times [`Store::retry`] re-runs a conflicting transaction.
pub const DEFAULT_RETRIES: usize = 8;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("transaction conflicted with a concurrent commit")]
    Conflict,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("failed to decode {column:?} entry: {source}")]
    Decode {
        column: Column,
        source: std::io::Error,
    },
    #[error("failed to encode {column:?} entry: {source}")]
    Encode {
        column: Column,
        source: std::io::Error,
    },
}

#[derive(Clone, Debug)]
struct Row {
    version: u64,
    value: Vec<u8>,
}

struct Inner {
    rows: RwLock<BTreeMap<Key, Row>>,
    clock: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
}

/// Cheaply clonable handle to one in-memory store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.inner.rows.read().map_or(0, |rows| rows.len());

        f.debug_struct("Store").field("rows", &rows).finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: RwLock::default(),
                clock: AtomicU64::new(0),
                listeners: RwLock::default(),
            }),
        }
    }

    #[must_use]
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    pub fn subscribe(&self, listener: Arc<dyn StoreListener>) -> Result<(), StoreError> {
        self.inner
            .listeners
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(listener);

        Ok(())
    }

    /// Runs `f` inside a fresh transaction and commits it, starting over when
    /// the commit conflicts with a concurrent one.
    pub fn retry<T, F>(&self, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut Transaction) -> Result<T, StoreError>,
    {
        let mut attempt = 0;

        loop {
            let mut tx = self.begin();
            let value = f(&mut tx)?;

            match tx.commit() {
                Ok(_) => return Ok(value),
                Err(StoreError::Conflict) if attempt < DEFAULT_RETRIES => {
                    attempt += 1;
                    trace!(attempt, "retrying conflicting transaction");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn rows(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Key, Row>>, StoreError> {
        self.inner.rows.read().map_err(|_| StoreError::Poisoned)
    }

    fn rows_mut(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Key, Row>>, StoreError> {
        self.inner.rows.write().map_err(|_| StoreError::Poisoned)
    }

    fn read(&self, key: &Key) -> Result<Option<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .rows()?
            .get(key)
            .map(|row| (row.version, row.value.clone())))
    }

    fn scan(&self, column: Column, prefix: &[u8]) -> Result<Vec<(Key, u64, Vec<u8>)>, StoreError> {
        let rows = self.rows()?;
        let start = Key::new(column, prefix.to_vec());

        Ok(rows
            .range(start..)
            .take_while(|(key, _)| key.column() == column && key.as_bytes().starts_with(prefix))
            .map(|(key, row)| (key.clone(), row.version, row.value.clone()))
            .collect())
    }

    fn notify(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }

        let Ok(listeners) = self.inner.listeners.read() else {
            return;
        };

        for listener in listeners.iter() {
            listener.on_commit(changes);
        }
    }
}

#[cfg(test)]
#[path = "tests/store.rs"]
mod tests;
