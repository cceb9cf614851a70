use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_wire::message::Hello;
use proofnet_wire::Frame;
use tracing::debug;

use crate::connection::PeerInfo;
use crate::node::Shared;
use crate::selector::is_resolver;
use crate::transport::{expect_message, Transport};
use crate::NetworkError;

/// Symmetric exchange of [`Hello`]s opening every connection. Runs before
/// the peer is known, so it drives the transport directly.
#[derive(Debug)]
pub(crate) struct Handshake<'a> {
    pub shared: &'a Shared,
    /// Which way the connection was opened from this side.
    pub direction: Gender,
    /// Node the caller means to reach, checked against the peer's Hello.
    pub expected: Option<NodeId>,
    /// The peer's Hello when the accept path already read it.
    pub first: Option<Frame>,
}

impl Handshake<'_> {
    pub async fn run(self, transport: &mut Transport) -> Result<PeerInfo, NetworkError> {
        let shared = self.shared;
        let ours = Hello {
            node_id: shared.node_id(),
            gender: shared.gender(),
            listen_address: shared.public_address(),
            versions: shared.config.network.versions,
        };

        transport.send(ours).await?;

        let frame = match self.first {
            Some(frame) => frame,
            None => transport.recv_frame().await?,
        };
        let theirs = expect_message!(transport.decode(&frame, None)?, Hello);

        if theirs.node_id == ours.node_id {
            return Err(NetworkError::protocol("connected to ourselves"));
        }

        if let Some(expected) = self.expected {
            if theirs.node_id != expected {
                return Err(NetworkError::UnexpectedPeer {
                    expected,
                    actual: theirs.node_id,
                });
            }
        }

        let Some(version) = ours.versions.negotiate(theirs.versions) else {
            return Err(NetworkError::protocol(format!(
                "no common protocol version: ours {:?}, theirs {:?}",
                ours.versions, theirs.versions
            )));
        };

        transport.negotiated(version);

        debug!(
            peer=%theirs.node_id,
            gender=%theirs.gender,
            %version,
            "handshake complete"
        );

        Ok(PeerInfo {
            node_id: theirs.node_id,
            gender: theirs.gender,
            listen_address: theirs.listen_address,
            version,
            direction: self.direction,
            address: transport.peer_addr(),
            resolver: is_resolver(ours.node_id, theirs.node_id),
        })
    }
}
