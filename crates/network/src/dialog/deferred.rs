//! Hand-over of store-and-forward messages between holders.

use async_trait::async_trait;
use proofnet_primitives::gender::Gender;
use proofnet_store::deferred::{self, DeferredMessage};
use proofnet_store::{StoreError, Transaction};
use proofnet_wire::message::{DeferredAck, DeferredMessages};
use tracing::{debug, info, trace};

use super::delivery::deliver;
use super::{Dialog, DialogContext};
use crate::connection::PeerInfo;
use crate::node::Shared;
use crate::outcome::Outcome;
use crate::transport::{expect_message, persist};
use crate::NetworkError;

/// Messages the local node should hand to `peer`: those addressed to it,
/// plus everything not addressed to this node when a Male hands over to a
/// Female relay. Messages that could never fit in a frame are skipped.
pub(crate) fn pending_for(
    tx: &mut Transaction,
    shared: &Shared,
    peer: &PeerInfo,
) -> Result<Vec<DeferredMessage>, StoreError> {
    let local = shared.node_id();
    let holdings = if relays_all(shared, peer) {
        deferred::held_by(tx, local)?
    } else {
        deferred::held_for(tx, local, peer.node_id)?
    };

    let limits = shared.config.limits.wire();
    let max_items = limits.max_array_len as usize;
    let max_bytes = limits.max_frame_len as usize;
    let mut messages = Vec::new();
    let mut bytes = DeferredMessages::HEADER_LEN;

    for holding in holdings.into_iter().filter(|holding| holding.recipient() != local) {
        if messages.len() == max_items {
            break;
        }

        let Some(message) = tx.get::<DeferredMessage>(&holding.message())? else {
            continue;
        };

        let len = DeferredMessages::entry_len(message.content().len());
        if DeferredMessages::HEADER_LEN + len > max_bytes {
            trace!(id=%holding.message(), len, "deferred message exceeds the frame limit");
            continue;
        }

        if bytes + len > max_bytes {
            break;
        }

        bytes += len;
        messages.push(message);
    }

    Ok(messages)
}

fn relays_all(shared: &Shared, peer: &PeerInfo) -> bool {
    shared.gender() == Gender::Male && peer.gender == Gender::Female
}

/// Sends pending messages and releases the ones the peer took over.
#[derive(Debug)]
pub(crate) struct HandOverDeferred;

#[async_trait]
impl Dialog for HandOverDeferred {
    type Output = usize;

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<usize>, NetworkError> {
        let messages = pending_for(&mut cx.shared.store.begin(), cx.shared, cx.peer)?;
        let sent: Vec<_> = messages.iter().map(DeferredMessage::digest).collect();

        cx.transport.send(DeferredMessages { messages }).await?;

        let budget = cx.transport.budget().saturating_mul(2);
        let Some(frame) = cx.answer_within(budget).await? else {
            return Ok(Outcome::Aborted);
        };
        let DeferredAck { ids } = expect_message!(cx.decode(&frame)?, DeferredAck);

        let local = cx.shared.node_id();
        let released = persist(&cx.shared.store, |tx| {
            let mut released = 0;

            for id in ids.iter().filter(|id| sent.contains(id)) {
                let _deleted = deferred::release(tx, local, *id)?;
                released += 1;
            }

            Ok(released)
        })?;

        info!(peer=%cx.peer.node_id, sent = sent.len(), released, "handed over deferred messages");

        Ok(Outcome::Done(released))
    }
}

/// Takes custody of handed-over messages: holds all of them in the
/// transaction that stores them, then delivers and releases those addressed
/// to this node.
#[derive(Debug)]
pub(crate) struct TakeOverDeferred;

#[async_trait]
impl Dialog for TakeOverDeferred {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let local = cx.shared.node_id();

        let messages = persist(&cx.shared.store, |tx| {
            let batch = cx.transport.decode(&frame, Some(&mut *tx))?;
            let DeferredMessages { messages } = expect_message!(batch, DeferredMessages);

            for message in &messages {
                let _holding = deferred::hold(tx, local, message)?;
            }

            Ok(messages)
        })?;

        let ids: Vec<_> = messages.iter().map(DeferredMessage::digest).collect();

        for message in messages {
            if message.recipient() == local {
                take_delivery(cx.shared, message).await?;
            }
        }

        cx.transport.send(DeferredAck { ids }).await?;

        Ok(Outcome::Done(()))
    }
}

async fn take_delivery(shared: &Shared, message: DeferredMessage) -> Result<(), NetworkError> {
    let id = message.digest();
    let kind = message.kind();

    if let Err(rejection) = deliver(shared, None, kind, message.content().to_vec()).await {
        debug!(%id, ?kind, %rejection, "deferred message rejected on delivery");
    }

    let local = shared.node_id();
    let _deleted = persist(&shared.store, |tx| Ok(deferred::release(tx, local, id)?))?;

    Ok(())
}
