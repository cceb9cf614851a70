use core::fmt;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use crate::key::{Column, Entity, Key};
use crate::listener::{Change, ChangeKind};
use crate::{Store, StoreError};

#[derive(Clone, Debug)]
pub enum Operation {
    Put { value: Vec<u8> },
    Delete,
}

/// A prefix scan remembered so that commit can detect rows appearing or
/// disappearing under it.
#[derive(Debug)]
struct ScanRead {
    column: Column,
    prefix: Vec<u8>,
    seen: Vec<(Vec<u8>, u64)>,
}

/// Buffered unit of work against a [`Store`].
///
/// Reads see the transaction's own writes first. Nothing becomes visible to
/// other transactions until [`commit`](Self::commit) succeeds.
pub struct Transaction {
    store: Store,
    reads: BTreeMap<Key, u64>,
    scans: Vec<ScanRead>,
    writes: BTreeMap<Key, Operation>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("reads", &self.reads.len())
            .field("scans", &self.scans.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

impl Transaction {
    pub(crate) const fn new(store: Store) -> Self {
        Self {
            store,
            reads: BTreeMap::new(),
            scans: Vec::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn get<E: Entity>(&mut self, id: &E::Id) -> Result<Option<E>, StoreError> {
        let Some(bytes) = self.get_raw(&E::key(id))? else {
            return Ok(None);
        };

        decode::<E>(&bytes).map(Some)
    }

    pub fn contains<E: Entity>(&mut self, id: &E::Id) -> Result<bool, StoreError> {
        Ok(self.get_raw(&E::key(id))?.is_some())
    }

    pub fn put<E: Entity>(&mut self, entity: &E) -> Result<(), StoreError> {
        let value = borsh::to_vec(entity).map_err(|source| StoreError::Encode {
            column: E::COLUMN,
            source,
        })?;

        self.put_raw(E::key(&entity.id()), value);

        Ok(())
    }

    pub fn delete<E: Entity>(&mut self, id: &E::Id) {
        self.delete_raw(E::key(id));
    }

    /// All entities of `E` whose key starts with `prefix`, in key order.
    pub fn scan<E: Entity>(&mut self, prefix: &[u8]) -> Result<Vec<E>, StoreError> {
        self.scan_raw(E::COLUMN, prefix)?
            .into_iter()
            .map(|(_, value)| decode::<E>(&value))
            .collect()
    }

    pub fn get_raw(&mut self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(op) = self.writes.get(key) {
            return Ok(match op {
                Operation::Put { value } => Some(value.clone()),
                Operation::Delete => None,
            });
        }

        let row = self.store.read(key)?;
        let version = row.as_ref().map_or(0, |(version, _)| *version);
        let _previous = self.reads.entry(key.clone()).or_insert(version);

        Ok(row.map(|(_, value)| value))
    }

    pub fn put_raw(&mut self, key: Key, value: Vec<u8>) {
        drop(self.writes.insert(key, Operation::Put { value }));
    }

    pub fn delete_raw(&mut self, key: Key) {
        drop(self.writes.insert(key, Operation::Delete));
    }

    /// Keys and values under `prefix` in `column`, merged with this
    /// transaction's pending writes.
    pub fn scan_raw(
        &mut self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let rows = self.store.scan(column, prefix)?;

        self.scans.push(ScanRead {
            column,
            prefix: prefix.to_vec(),
            seen: rows
                .iter()
                .map(|(key, version, _)| (key.as_bytes().to_vec(), *version))
                .collect(),
        });

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = rows
            .into_iter()
            .map(|(key, _, value)| (key.as_bytes().to_vec(), value))
            .collect();

        let start = Key::new(column, prefix.to_vec());
        for (key, op) in self
            .writes
            .range(start..)
            .take_while(|(key, _)| key.column() == column && key.as_bytes().starts_with(prefix))
        {
            match op {
                Operation::Put { value } => {
                    drop(merged.insert(key.as_bytes().to_vec(), value.clone()));
                }
                Operation::Delete => {
                    drop(merged.remove(key.as_bytes()));
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies every buffered write atomically.
    ///
    /// Fails with [`StoreError::Conflict`] when a row read or scanned by this
    /// transaction was changed by a commit that happened after the read.
    pub fn commit(self) -> Result<Vec<Change>, StoreError> {
        let changes = {
            let mut rows = self.store.rows_mut()?;

            for (key, version) in &self.reads {
                let current = rows.get(key).map_or(0, |row| row.version);
                if current != *version {
                    return Err(StoreError::Conflict);
                }
            }

            for scan in &self.scans {
                let start = Key::new(scan.column, scan.prefix.clone());
                let current = rows
                    .range(start..)
                    .take_while(|(key, _)| {
                        key.column() == scan.column && key.as_bytes().starts_with(&scan.prefix)
                    })
                    .map(|(key, row)| (key.as_bytes(), row.version));

                if !current.eq(scan.seen.iter().map(|(key, v)| (key.as_slice(), *v))) {
                    return Err(StoreError::Conflict);
                }
            }

            let mut changes = Vec::with_capacity(self.writes.len());

            for (key, op) in self.writes {
                match op {
                    Operation::Put { value } => {
                        let version = self.store.inner.clock.fetch_add(1, Ordering::SeqCst) + 1;
                        drop(rows.insert(key.clone(), crate::Row { version, value }));
                        changes.push(Change::new(key, ChangeKind::Put));
                    }
                    Operation::Delete => {
                        if rows.remove(&key).is_some() {
                            changes.push(Change::new(key, ChangeKind::Delete));
                        }
                    }
                }
            }

            changes
        };

        self.store.notify(&changes);

        Ok(changes)
    }
}

fn decode<E: Entity>(bytes: &[u8]) -> Result<E, StoreError> {
    E::try_from_slice(bytes).map_err(|source| StoreError::Decode {
        column: E::COLUMN,
        source,
    })
}
