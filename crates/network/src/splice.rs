//! Broker-side bookkeeping of outstanding splices.
//!
//! A splice is minted when a requester asks the broker for a connection to a
//! target. Both ends then open raw sockets to the broker and claim the id;
//! the first claim parks its socket, the second one takes both sockets out
//! and relaying starts. Claims are single-use: once paired, discarded or
//! expired, the id is unknown.

use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ClaimError {
    #[error("{0} is unknown, expired or already used")]
    Unknown(SplicedConnectionId),
    #[error("{claimant} is not a participant of {id}")]
    NotParticipant {
        id: SplicedConnectionId,
        claimant: NodeId,
    },
    #[error("{claimant} already claimed {id}")]
    AlreadyClaimed {
        id: SplicedConnectionId,
        claimant: NodeId,
    },
}

#[derive(Debug)]
pub enum Claim<S> {
    /// First end: the stream is held until the other end claims.
    Parked,
    /// Second end: both streams, the parked one first.
    Paired { parked: S, claimant: S },
}

#[derive(Debug)]
struct Slot<S> {
    requester: NodeId,
    target: NodeId,
    minted: Instant,
    parked: Option<(NodeId, S)>,
}

#[derive(Debug)]
pub struct SpliceRegistry<S> {
    slots: Mutex<BTreeMap<SplicedConnectionId, Slot<S>>>,
    ttl: Duration,
}

impl<S> SpliceRegistry<S> {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            ttl,
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut BTreeMap<SplicedConnectionId, Slot<S>>) -> T) -> T {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        f(&mut slots)
    }

    pub fn mint(&self, requester: NodeId, target: NodeId) -> SplicedConnectionId {
        let id = SplicedConnectionId::mint();

        self.with(|slots| {
            drop(slots.insert(
                id,
                Slot {
                    requester,
                    target,
                    minted: Instant::now(),
                    parked: None,
                },
            ));
        });

        debug!(%id, %requester, %target, "minted splice");

        id
    }

    /// Claims one end of `id` with `stream`. On failure the stream is handed
    /// back so the caller can report the error on it.
    pub fn claim(
        &self,
        id: SplicedConnectionId,
        claimant: NodeId,
        stream: S,
    ) -> Result<Claim<S>, (ClaimError, S)> {
        self.with(|slots| {
            let Some(slot) = slots.get_mut(&id) else {
                return Err((ClaimError::Unknown(id), stream));
            };

            if slot.minted.elapsed() > self.ttl {
                drop(slots.remove(&id));
                return Err((ClaimError::Unknown(id), stream));
            }

            if claimant != slot.requester && claimant != slot.target {
                return Err((ClaimError::NotParticipant { id, claimant }, stream));
            }

            match slot.parked.take() {
                None => {
                    slot.parked = Some((claimant, stream));
                    Ok(Claim::Parked)
                }
                Some((first, parked)) if first == claimant => {
                    slot.parked = Some((first, parked));
                    Err((ClaimError::AlreadyClaimed { id, claimant }, stream))
                }
                Some((_, parked)) => {
                    drop(slots.remove(&id));
                    Ok(Claim::Paired {
                        parked,
                        claimant: stream,
                    })
                }
            }
        })
    }

    /// Releases a slot that will never be claimed. Returns whether it existed.
    pub fn discard(&self, id: SplicedConnectionId) -> bool {
        self.with(|slots| slots.remove(&id).is_some())
    }

    /// Drops every slot older than the ttl, closing any parked stream.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;

        let expired: Vec<_> = self.with(|slots| {
            let ids: Vec<_> = slots
                .iter()
                .filter(|(_, slot)| slot.minted.elapsed() > ttl)
                .map(|(id, _)| *id)
                .collect();

            ids.into_iter()
                .filter_map(|id| slots.remove(&id).map(|slot| (id, slot)))
                .collect()
        });

        for (id, slot) in &expired {
            debug!(%id, parked = slot.parked.is_some(), "splice expired");
        }

        expired.len()
    }

    /// Number of minted splices not yet paired, discarded or expired.
    pub fn pending(&self) -> usize {
        self.with(|slots| slots.len())
    }
}

#[cfg(test)]
#[path = "tests/splice.rs"]
mod tests;
