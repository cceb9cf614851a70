//! Per-connection tree of protocol stages.
//!
//! The tree only holds live phases: a child is attached when entered and
//! detached once it reaches a terminal state. The root stays attached for
//! the whole connection so that its final state remains visible.

use core::fmt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use proofnet_wire::message::LoopDialogType;
use tracing::{debug, trace};

use crate::NetworkError;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PhaseType {
    Root,
    Handshake,
    /// Raw socket claiming one end of a splice at a broker.
    SpliceClaim,
    /// Broker side of a claimed splice, relaying bytes.
    Relay,
    /// The repeating dialog loop of an established connection.
    Conjugal,
    Dialog(LoopDialogType),
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dialog(dialog) => write!(f, "Dialog({dialog:?})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhaseState {
    Entered,
    RunningChild,
    Completed,
    Failed,
}

impl PhaseState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

type PhaseId = u64;

#[derive(Debug)]
struct Node {
    parent: Option<PhaseId>,
    kind: PhaseType,
    state: PhaseState,
}

#[derive(Debug, Default)]
struct Tree {
    next: PhaseId,
    nodes: BTreeMap<PhaseId, Node>,
}

/// Diagnostic view of one live phase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhaseInfo {
    pub kind: PhaseType,
    pub state: PhaseState,
    pub depth: usize,
}

/// Shared handle on a connection's phase tree.
#[derive(Clone, Debug, Default)]
pub struct PhaseTracker {
    tree: Arc<Mutex<Tree>>,
}

impl PhaseTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the root phase. There is one root per tracker.
    #[must_use]
    pub fn root(&self) -> Phase {
        self.enter(None, PhaseType::Root)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tree) -> T) -> T {
        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);

        f(&mut tree)
    }

    fn enter(&self, parent: Option<PhaseId>, kind: PhaseType) -> Phase {
        let id = self.with(|tree| {
            let id = tree.next;
            tree.next += 1;

            if let Some(parent) = parent.and_then(|parent| tree.nodes.get_mut(&parent)) {
                parent.state = PhaseState::RunningChild;
            }

            drop(tree.nodes.insert(
                id,
                Node {
                    parent,
                    kind,
                    state: PhaseState::Entered,
                },
            ));

            id
        });

        trace!(phase=%kind, "entered phase");

        Phase {
            tracker: self.clone(),
            id,
            kind,
            finished: false,
        }
    }

    fn finish(&self, id: PhaseId, state: PhaseState) {
        self.with(|tree| {
            let Some(node) = tree.nodes.get_mut(&id) else {
                return;
            };

            node.state = state;

            let Some(parent) = node.parent else {
                return;
            };

            drop(tree.nodes.remove(&id));

            let busy = tree.nodes.values().any(|node| node.parent == Some(parent));
            if let Some(parent) = tree.nodes.get_mut(&parent) {
                if !busy && parent.state == PhaseState::RunningChild {
                    parent.state = PhaseState::Entered;
                }
            }
        });
    }

    /// Live phases, root first, children after their parent.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PhaseInfo> {
        self.with(|tree| {
            let mut out = Vec::with_capacity(tree.nodes.len());
            let mut stack: Vec<(PhaseId, usize)> = tree
                .nodes
                .iter()
                .filter(|(_, node)| node.parent.is_none())
                .map(|(id, _)| (*id, 0))
                .collect();

            while let Some((id, depth)) = stack.pop() {
                let Some(node) = tree.nodes.get(&id) else {
                    continue;
                };

                out.push(PhaseInfo {
                    kind: node.kind,
                    state: node.state,
                    depth,
                });

                stack.extend(
                    tree.nodes
                        .iter()
                        .filter(|(_, child)| child.parent == Some(id))
                        .map(|(child, _)| (*child, depth + 1))
                        .rev(),
                );
            }

            out
        })
    }

    /// State of the root phase, if one was entered.
    #[must_use]
    pub fn root_state(&self) -> Option<PhaseState> {
        self.with(|tree| {
            tree.nodes
                .values()
                .find(|node| node.parent.is_none())
                .map(|node| node.state)
        })
    }
}

/// One entered phase. Dropping it without finishing marks it failed.
#[derive(Debug)]
pub struct Phase {
    tracker: PhaseTracker,
    id: PhaseId,
    kind: PhaseType,
    finished: bool,
}

impl Phase {
    #[must_use]
    pub const fn kind(&self) -> PhaseType {
        self.kind
    }

    #[must_use]
    pub fn child(&self, kind: PhaseType) -> Self {
        self.tracker.enter(Some(self.id), kind)
    }

    /// Runs `f` inside a child phase of type `kind`, which completes or
    /// fails with the result.
    pub async fn run_child<T, F>(&self, kind: PhaseType, f: F) -> Result<T, NetworkError>
    where
        F: Future<Output = Result<T, NetworkError>>,
    {
        let child = self.child(kind);
        let result = f.await;

        match &result {
            Ok(_) => child.complete(),
            Err(err) => child.fail(err),
        }

        result
    }

    pub fn complete(mut self) {
        self.finished = true;
        self.tracker.finish(self.id, PhaseState::Completed);
        trace!(phase=%self.kind, "phase completed");
    }

    pub fn fail(mut self, err: &NetworkError) {
        self.finished = true;
        self.tracker.finish(self.id, PhaseState::Failed);
        debug!(phase=%self.kind, %err, "phase failed");
    }
}

impl Drop for Phase {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.finish(self.id, PhaseState::Failed);
        }
    }
}

#[cfg(test)]
#[path = "tests/phase.rs"]
mod tests;
