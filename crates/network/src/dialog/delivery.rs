//! Unicast delivery of signature requests and persons.
//!
//! A Female that is not the recipient keeps the payload as a deferred
//! message and hands it over once the recipient shows up.

use async_trait::async_trait;
use bytes::BytesMut;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::time::now_millis;
use proofnet_store::deferred::{self, DeferredKind, DeferredMessage};
use proofnet_store::object::{ObjectKind, StoredObject};
use proofnet_primitives::version::ProtocolVersion;
use proofnet_wire::frame::frame_len;
use proofnet_wire::message::{DeferredMessages, Persons, SignatureRequest, Verdict};
use proofnet_wire::payload::Payload;
use proofnet_wire::{Limits, WireReader, WireWriter};
use tokio::time::timeout;
use tracing::debug;

use super::{Dialog, DialogContext};
use crate::node::Shared;
use crate::outcome::{Outcome, Rejection};
use crate::transport::{expect_message, persist};
use crate::NetworkError;

#[derive(Debug)]
pub(crate) struct SendSignatureRequest {
    pub recipient: NodeId,
    /// Already ciphered for `recipient`.
    pub ciphered: Vec<u8>,
}

#[async_trait]
impl Dialog for SendSignatureRequest {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        cx.transport
            .send(SignatureRequest {
                sender: cx.shared.node_id(),
                recipient: self.recipient,
                ciphered: self.ciphered,
            })
            .await?;

        verdict(cx).await
    }
}

#[derive(Debug)]
pub(crate) struct SendPersons {
    pub recipient: NodeId,
    pub persons: Vec<StoredObject>,
}

#[async_trait]
impl Dialog for SendPersons {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        cx.transport
            .send(Persons {
                sender: cx.shared.node_id(),
                recipient: self.recipient,
                persons: self.persons,
            })
            .await?;

        verdict(cx).await
    }
}

async fn verdict(cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
    let Some(frame) = cx.answer().await? else {
        return Ok(Outcome::Aborted);
    };
    let verdict = expect_message!(cx.decode(&frame)?, Verdict);

    Ok(if verdict.accepted {
        Outcome::Done(())
    } else {
        Outcome::Rejected(Rejection::new(
            verdict.cause.unwrap_or_else(|| "rejected by peer".to_owned()),
        ))
    })
}

#[derive(Debug)]
pub(crate) struct ReceiveSignatureRequest;

#[async_trait]
impl Dialog for ReceiveSignatureRequest {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let request = expect_message!(cx.decode(&frame)?, SignatureRequest);

        if request.sender != cx.peer.node_id {
            return Err(NetworkError::protocol(format!(
                "signature request from {} claims sender {}",
                cx.peer.node_id, request.sender
            )));
        }

        let result = receive(
            cx.shared,
            request.sender,
            request.recipient,
            DeferredKind::SignatureRequest,
            request.ciphered,
        )
        .await?;

        cx.transport.send(into_verdict(result)).await?;

        Ok(Outcome::Done(()))
    }
}

#[derive(Debug)]
pub(crate) struct ReceivePersons;

#[async_trait]
impl Dialog for ReceivePersons {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let persons = expect_message!(cx.decode(&frame)?, Persons);

        if persons.sender != cx.peer.node_id {
            return Err(NetworkError::protocol(format!(
                "persons from {} claim sender {}",
                cx.peer.node_id, persons.sender
            )));
        }

        let content = encode_persons(&persons.persons)?;
        let result = receive(
            cx.shared,
            persons.sender,
            persons.recipient,
            DeferredKind::Persons,
            content,
        )
        .await?;

        cx.transport.send(into_verdict(result)).await?;

        Ok(Outcome::Done(()))
    }
}

fn into_verdict(result: Result<(), Rejection>) -> Verdict {
    match result {
        Ok(()) => Verdict::accept(),
        Err(rejection) => Verdict::reject(rejection.cause()),
    }
}

/// Delivers a payload addressed to this node, or keeps it for a recipient
/// this Female node relays for.
async fn receive(
    shared: &Shared,
    sender: NodeId,
    recipient: NodeId,
    kind: DeferredKind,
    content: Vec<u8>,
) -> Result<Result<(), Rejection>, NetworkError> {
    if recipient == shared.node_id() {
        return Ok(deliver(shared, Some(sender), kind, content).await);
    }

    if shared.gender() != Gender::Female {
        return Ok(Err(Rejection::new(format!("{recipient} is not reachable here"))));
    }

    if let Err(err) = ensure_deferrable(shared.config.limits.wire(), content.len()) {
        return Ok(Err(Rejection::new(format!("cannot relay: {err}"))));
    }

    let message = DeferredMessage::new(recipient, now_millis(), kind, content);
    let local = shared.node_id();
    let _holding = persist(&shared.store, |tx| Ok(deferred::hold(tx, local, &message)?))?;

    debug!(%sender, %recipient, ?kind, "deferred message for relay");

    Ok(Ok(()))
}

/// Hands a payload addressed to this node to the inbound handler.
pub(crate) async fn deliver(
    shared: &Shared,
    sender: Option<NodeId>,
    kind: DeferredKind,
    content: Vec<u8>,
) -> Result<(), Rejection> {
    let budget = shared.config.timeouts.dialog;
    let inbound = &shared.services.inbound;

    let delivery = async {
        match kind {
            DeferredKind::SignatureRequest => {
                let Some(payload) = shared.services.cipher.decipher(content) else {
                    return Err(Rejection::new("cannot decipher signature request"));
                };
                inbound.signature_request(sender, payload).await
            }
            DeferredKind::Persons => {
                let persons = decode_persons(&content, shared.config.limits.wire())
                    .map_err(|err| Rejection::new(format!("malformed persons: {err}")))?;
                inbound.persons(sender, persons).await
            }
        }
    };

    timeout(budget, delivery)
        .await
        .unwrap_or_else(|_| Err(Rejection::new("delivery timed out")))
}

/// Fails with [`NetworkError::TooLarge`] unless `payload` fits in one frame.
pub(crate) fn ensure_fits<P: Payload>(limits: Limits, payload: &P) -> Result<(), NetworkError> {
    check_len(limits, frame_len(payload, ProtocolVersion::LATEST)?)
}

/// Fails with [`NetworkError::TooLarge`] unless a deferred message with
/// `content_len` bytes of content can be handed over on its own.
pub(crate) fn ensure_deferrable(limits: Limits, content_len: usize) -> Result<(), NetworkError> {
    check_len(
        limits,
        DeferredMessages::HEADER_LEN + DeferredMessages::entry_len(content_len),
    )
}

fn check_len(limits: Limits, len: usize) -> Result<(), NetworkError> {
    if len > limits.max_frame_len as usize {
        return Err(NetworkError::TooLarge {
            len,
            max: limits.max_frame_len,
        });
    }

    Ok(())
}

/// Length of what [`encode_persons`] produces for `persons`.
pub(crate) fn persons_content_len(persons: &[StoredObject]) -> usize {
    4 + persons
        .iter()
        .map(|person| 4 + person.data().len())
        .sum::<usize>()
}

/// Person records packed into deferred message content.
pub(crate) fn encode_persons(persons: &[StoredObject]) -> Result<Vec<u8>, NetworkError> {
    let mut buf = BytesMut::new();
    let mut w = WireWriter::new(&mut buf);

    w.count(persons.len())?;
    for person in persons {
        w.bytes(person.data())?;
    }

    Ok(buf.to_vec())
}

pub(crate) fn decode_persons(
    content: &[u8],
    limits: Limits,
) -> Result<Vec<StoredObject>, NetworkError> {
    let mut r = WireReader::new(content, limits);
    let count = r.count()?;
    let mut persons = Vec::with_capacity(count.min(r.remaining()));

    for _ in 0..count {
        persons.push(StoredObject::new(ObjectKind::Person, r.bytes()?));
    }

    if !r.is_empty() {
        return Err(NetworkError::protocol("trailing bytes after persons"));
    }

    Ok(persons)
}
