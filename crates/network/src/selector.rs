//! Agreement on the next loop dialog.
//!
//! Each round both sides send one proposal and read one. The resolver, the
//! side with the greater node id, settles differing proposals, so both ends
//! reach the same answer without another round trip.

use proofnet_primitives::identity::NodeId;
use proofnet_wire::message::LoopDialogType;

/// Whether the local side settles differing proposals on this connection.
#[must_use]
pub fn is_resolver(local: NodeId, peer: NodeId) -> bool {
    local > peer
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Agreement {
    pub dialog: LoopDialogType,
    /// The local side drives the dialog; its proposal was the one chosen.
    pub active: bool,
}

/// Settles one round. Quit always wins, and Idle gives way to any work.
#[must_use]
pub fn agree(mine: LoopDialogType, theirs: LoopDialogType, resolver: bool) -> Agreement {
    use LoopDialogType::{Idle, Quit};

    let (dialog, active) = match (mine, theirs) {
        (Quit, Quit) => (Quit, resolver),
        (Quit, _) => (Quit, true),
        (_, Quit) => (Quit, false),
        _ if mine == theirs => (mine, resolver),
        (Idle, _) => (theirs, false),
        (_, Idle) => (mine, true),
        _ if resolver => (mine, true),
        _ => (theirs, false),
    };

    Agreement { dialog, active }
}

#[cfg(test)]
#[path = "tests/selector.rs"]
mod tests;
