//! Brokered connections between two nodes that cannot dial each other.
//!
//! The requester asks a broker it is connected to; the broker mints a
//! splice id and introduces the requester to the target over the target's
//! connection. Both ends then claim the id on fresh sockets to the broker,
//! which relays bytes between them once both claims are in.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_wire::message::{
    SpliceAccepted, SpliceClaim, SpliceError, SpliceIntroduction, SpliceRequest,
};
use proofnet_wire::Message;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{Dialog, DialogContext};
use crate::node::Shared;
use crate::outcome::{Outcome, Rejection};
use crate::transport::{expect_message, Transport};
use crate::NetworkError;

/// Requester side: asks the broker for a splice to `target`.
#[derive(Debug)]
pub(crate) struct RequestSplice {
    pub target: NodeId,
    pub address: Option<SocketAddr>,
}

#[async_trait]
impl Dialog for RequestSplice {
    type Output = SplicedConnectionId;

    async fn dialogate(
        self,
        cx: &mut DialogContext<'_>,
    ) -> Result<Outcome<SplicedConnectionId>, NetworkError> {
        cx.transport
            .send(SpliceRequest {
                target: self.target,
                address: self.address,
            })
            .await?;

        // The broker may have to connect to the target and introduce us first.
        let budget = cx.shared.config.timeouts.connect + cx.transport.budget().saturating_mul(4);
        let Some(frame) = cx.answer_within(budget).await? else {
            return Ok(Outcome::Aborted);
        };

        match cx.decode(&frame)? {
            Message::SpliceAccepted(SpliceAccepted { id }) => Ok(Outcome::Done(id)),
            Message::SpliceError(SpliceError { cause }) => {
                Ok(Outcome::Rejected(Rejection::new(cause)))
            }
            other => Err(NetworkError::protocol(format!(
                "expected splice answer, got {}",
                other.name()
            ))),
        }
    }
}

/// Broker side of a splice request.
#[derive(Debug)]
pub(crate) struct BrokerSplice;

#[async_trait]
impl Dialog for BrokerSplice {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let request = expect_message!(cx.decode(&frame)?, SpliceRequest);
        let requester = cx.peer.node_id;

        let answer = match broker(cx.shared, requester, request).await {
            Ok(id) => Message::from(SpliceAccepted { id }),
            Err(cause) => {
                debug!(%requester, %cause, "splice refused");
                Message::from(SpliceError { cause })
            }
        };

        cx.transport.send(answer).await?;

        Ok(Outcome::Done(()))
    }
}

/// Mints a splice and introduces `requester` to the target. Every failure
/// is turned into a cause for the requester and releases the slot.
async fn broker(
    shared: &Arc<Shared>,
    requester: NodeId,
    request: SpliceRequest,
) -> Result<SplicedConnectionId, String> {
    let target = request.target;

    let Some(broker) = shared.public_address() else {
        return Err("broker does not accept connections".to_owned());
    };

    if target == shared.node_id() || target == requester {
        return Err(format!("cannot splice {requester} to {target}"));
    }

    let id = shared.splices.mint(requester, target);

    let cause = match shared.introduce(id, broker, requester, target, request.address).await {
        Ok(Outcome::Done(())) => {
            info!(%id, %requester, %target, "splice introduced");
            return Ok(id);
        }
        Ok(Outcome::Rejected(rejection)) => format!("{target} refused: {rejection}"),
        Ok(Outcome::Aborted) => format!("introduction to {target} was aborted"),
        Err(err) => format!("cannot introduce {target}: {err}"),
    };

    let _existed = shared.splices.discard(id);

    Err(cause)
}

/// Broker side: tells the target where to claim the splice.
#[derive(Debug)]
pub(crate) struct IntroduceSplice {
    pub id: SplicedConnectionId,
    pub broker: SocketAddr,
    pub requester: NodeId,
}

#[async_trait]
impl Dialog for IntroduceSplice {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        cx.transport
            .send(SpliceIntroduction {
                id: self.id,
                broker: self.broker,
                requester: self.requester,
            })
            .await?;

        let budget = cx.shared.config.timeouts.connect + cx.transport.budget();
        let Some(frame) = cx.answer_within(budget).await? else {
            return Ok(Outcome::Aborted);
        };

        match cx.decode(&frame)? {
            Message::SpliceAccepted(SpliceAccepted { id }) if id == self.id => {
                Ok(Outcome::Done(()))
            }
            Message::SpliceAccepted(SpliceAccepted { id }) => Err(NetworkError::protocol(
                format!("introduced {}, accepted {id}", self.id),
            )),
            Message::SpliceError(SpliceError { cause }) => {
                Ok(Outcome::Rejected(Rejection::new(cause)))
            }
            other => Err(NetworkError::protocol(format!(
                "expected introduction answer, got {}",
                other.name()
            ))),
        }
    }
}

/// Target side: claims the splice at the broker and, once claimed, runs the
/// spliced connection in the background.
#[derive(Debug)]
pub(crate) struct AcceptIntroduction;

#[async_trait]
impl Dialog for AcceptIntroduction {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let introduction = expect_message!(cx.decode(&frame)?, SpliceIntroduction);
        let SpliceIntroduction {
            id,
            broker,
            requester,
        } = introduction;

        let answer = match claim(cx.shared, broker, id).await {
            Ok(transport) => {
                cx.shared.spawn_spliced(transport, id, requester);
                Message::from(SpliceAccepted { id })
            }
            Err(err) => {
                warn!(%id, %broker, %err, "cannot claim splice");
                Message::from(SpliceError {
                    cause: format!("cannot reach broker at {broker}: {err}"),
                })
            }
        };

        cx.transport.send(answer).await?;

        Ok(Outcome::Done(()))
    }
}

/// Opens a raw socket to `broker` and claims `id` on it. The claim is only
/// sent, the acknowledgement is read by the caller.
pub(crate) async fn claim(
    shared: &Shared,
    broker: SocketAddr,
    id: SplicedConnectionId,
) -> Result<Transport, NetworkError> {
    let connect = shared.config.timeouts.connect;
    let stream = timeout(connect, TcpStream::connect(broker))
        .await
        .map_err(|_| NetworkError::Timeout(connect))??;

    let mut transport = Transport::new(
        stream,
        shared.config.limits.wire(),
        shared.config.timeouts.dialog,
    )?;

    transport
        .send(SpliceClaim {
            id,
            claimant: shared.node_id(),
        })
        .await?;

    Ok(transport)
}

/// Waits until the broker has paired both claims of `id`.
pub(crate) async fn await_pairing(
    shared: &Shared,
    transport: &mut Transport,
    id: SplicedConnectionId,
) -> Result<(), NetworkError> {
    let ttl = shared.config.timeouts.splice_ttl;
    let frame = timeout(ttl, transport.recv_frame_unbounded())
        .await
        .map_err(|_| NetworkError::Timeout(ttl))??;

    match transport.decode(&frame, None)? {
        Message::SpliceClaimAck(ack) if ack.id == id => Ok(()),
        Message::SpliceError(SpliceError { cause }) => Err(NetworkError::splice(cause)),
        other => Err(NetworkError::protocol(format!(
            "expected claim acknowledgement for {id}, got {}",
            other.name()
        ))),
    }
}
