use crate::key::{Column, Key};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    Put,
    Delete,
}

/// One row written or removed by a committed transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Change {
    key: Key,
    kind: ChangeKind,
}

impl Change {
    pub(crate) const fn new(key: Key, kind: ChangeKind) -> Self {
        Self { key, kind }
    }

    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    #[must_use]
    pub const fn column(&self) -> Column {
        self.key.column()
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// Observer of committed changes.
///
/// Called synchronously from [`Transaction::commit`](crate::Transaction::commit)
/// once the writes are visible. Implementations must return quickly and must
/// not wait on network I/O.
pub trait StoreListener: Send + Sync {
    fn on_commit(&self, changes: &[Change]);
}
