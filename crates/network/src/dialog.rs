//! Bounded message exchanges, one per protocol step.
//!
//! Every loop dialog has the same shape: the active side sends one request
//! and the passive side answers with one message. An active side that gives
//! up early leaves at most that one answer on the stream, which the loop
//! skips before reading the next proposal.

use core::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use proofnet_wire::{Frame, Message};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::connection::PeerInfo;
use crate::node::Shared;
use crate::outcome::Outcome;
use crate::transport::Transport;
use crate::NetworkError;

pub(crate) mod deferred;
pub(crate) mod delivery;
pub(crate) mod handshake;
pub(crate) mod hooks;
pub(crate) mod join;
pub(crate) mod root_context;
pub(crate) mod splice;

/// What a dialog runs against.
#[derive(Debug)]
pub struct DialogContext<'a> {
    pub(crate) shared: &'a Arc<Shared>,
    pub(crate) transport: &'a mut Transport,
    pub(crate) peer: &'a PeerInfo,
    /// Fires when the caller that asked for the dialog gives up.
    pub(crate) cancel: CancellationToken,
}

impl<'a> DialogContext<'a> {
    pub(crate) fn new(
        shared: &'a Arc<Shared>,
        transport: &'a mut Transport,
        peer: &'a PeerInfo,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            transport,
            peer,
            cancel,
        }
    }

    /// Waits for the answer to a request, `None` once cancelled.
    pub(crate) async fn answer(&mut self) -> Result<Option<Frame>, NetworkError> {
        self.transport.recv_frame_or_cancel(&self.cancel).await
    }

    /// Like [`answer`](Self::answer) with a wider deadline, for answers the
    /// peer can only give after talking to a third node.
    pub(crate) async fn answer_within(
        &mut self,
        budget: Duration,
    ) -> Result<Option<Frame>, NetworkError> {
        let cancel = self.cancel.clone();

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            frame = timeout(budget, self.transport.recv_frame_unbounded()) => {
                frame.map_err(|_| NetworkError::Timeout(budget))?.map(Some)
            }
        }
    }

    /// Decodes an answer, persisting it when its kind requires a transaction.
    pub(crate) fn decode(&self, frame: &Frame) -> Result<Message, NetworkError> {
        if frame.is_persisted() {
            crate::transport::persist(&self.shared.store, |tx| {
                self.transport.decode(frame, Some(tx))
            })
        } else {
            self.transport.decode(frame, None)
        }
    }
}

/// One bounded exchange implementing one protocol step.
///
/// Dialogs never retry. Failures that leave the stream in an unknown state
/// are errors; a peer saying "no" is [`Outcome::Rejected`] and a caller
/// giving up is [`Outcome::Aborted`].
#[async_trait]
pub trait Dialog: Send + Sized {
    type Output: Send;

    async fn dialogate(
        self,
        cx: &mut DialogContext<'_>,
    ) -> Result<Outcome<Self::Output>, NetworkError>;
}
