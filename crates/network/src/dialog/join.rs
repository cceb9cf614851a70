use std::net::SocketAddr;

use async_trait::async_trait;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::time::now_millis;
use proofnet_store::hook;
use proofnet_wire::message::{JoinRequest, Verdict};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::handshake::Handshake;
use super::{Dialog, DialogContext};
use crate::node::Shared;
use crate::outcome::{Outcome, Rejection};
use crate::transport::{expect_message, persist, Transport};
use crate::NetworkError;

/// A Female announcing its public address to the network through the peer.
#[derive(Debug)]
pub(crate) struct Join {
    pub address: SocketAddr,
}

#[async_trait]
impl Dialog for Join {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        cx.transport
            .send(JoinRequest {
                listen_address: self.address,
            })
            .await?;

        // The peer connects back before answering.
        let budget = cx.shared.config.timeouts.connect + cx.transport.budget() * 2;
        let Some(frame) = cx.answer_within(budget).await? else {
            return Ok(Outcome::Aborted);
        };
        let verdict = expect_message!(cx.decode(&frame)?, Verdict);

        Ok(if verdict.accepted {
            Outcome::Done(())
        } else {
            Outcome::Rejected(Rejection::new(
                verdict.cause.unwrap_or_else(|| "join rejected".to_owned()),
            ))
        })
    }
}

/// Dials the announced address and remembers it as a hook when the joining
/// node answers there.
#[derive(Debug)]
pub(crate) struct ServeJoin;

#[async_trait]
impl Dialog for ServeJoin {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let request = expect_message!(cx.decode(&frame)?, JoinRequest);
        let address = request.listen_address;

        let verdict = if cx.peer.gender == Gender::Female {
            match dial_back(cx.shared, address, cx.peer.node_id).await {
                Ok(()) => {
                    let _hook = persist(&cx.shared.store, |tx| {
                        Ok(hook::record_success(tx, address, now_millis())?)
                    })?;
                    info!(peer=%cx.peer.node_id, %address, "peer joined");
                    Verdict::accept()
                }
                Err(err) => {
                    debug!(peer=%cx.peer.node_id, %address, %err, "join dial-back failed");
                    Verdict::reject(format!("cannot reach {address}: {err}"))
                }
            }
        } else {
            Verdict::reject("only Female nodes can join")
        };

        cx.transport.send(verdict).await?;

        Ok(Outcome::Done(()))
    }
}

/// Connects to `address` and checks that `expected` answers the handshake.
async fn dial_back(
    shared: &Shared,
    address: SocketAddr,
    expected: NodeId,
) -> Result<(), NetworkError> {
    let connect = shared.config.timeouts.connect;
    let stream = timeout(connect, TcpStream::connect(address))
        .await
        .map_err(|_| NetworkError::Timeout(connect))??;

    let mut transport = Transport::new(
        stream,
        shared.config.limits.wire(),
        shared.config.timeouts.dialog,
    )?;

    let _peer = Handshake {
        shared,
        direction: Gender::Male,
        expected: Some(expected),
        first: None,
    }
    .run(&mut transport)
    .await?;

    Ok(())
}
