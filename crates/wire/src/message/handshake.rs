use std::net::SocketAddr;

use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::{ProtocolVersion, VersionSet};

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PlainPayload};
use crate::WireError;

/// First message on every connection, sent by both ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hello {
    pub node_id: NodeId,
    pub gender: Gender,
    /// Publicly reachable address, announced by nodes that accept connections.
    pub listen_address: Option<SocketAddr>,
    pub versions: VersionSet,
}

impl Payload for Hello {
    const CODE: MessageCode = MessageCode::Hello;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.node_id(self.node_id);
        w.gender(self.gender);
        w.option(self.listen_address.as_ref(), |w, addr| {
            w.socket_addr(*addr);
            Ok(())
        })?;
        w.version_set(self.versions);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16 + 1)?;
        if r.bool()? {
            r.skip_socket_addr()?;
        }
        r.skip(4)
    }
}

impl PlainPayload for Hello {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            node_id: r.node_id()?,
            gender: r.gender()?,
            listen_address: r.option(WireReader::socket_addr)?,
            versions: r.version_set()?,
        })
    }
}

/// Sent on a raw socket to the broker to claim one end of a splice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpliceClaim {
    pub id: SplicedConnectionId,
    pub claimant: NodeId,
}

impl Payload for SpliceClaim {
    const CODE: MessageCode = MessageCode::SpliceClaim;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.splice_id(self.id);
        w.node_id(self.claimant);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16 + 16)
    }
}

impl PlainPayload for SpliceClaim {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            id: r.splice_id()?,
            claimant: r.node_id()?,
        })
    }
}

/// Both ends of the splice are present; relaying starts after this frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpliceClaimAck {
    pub id: SplicedConnectionId,
}

impl Payload for SpliceClaimAck {
    const CODE: MessageCode = MessageCode::SpliceClaimAck;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.splice_id(self.id);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)
    }
}

impl PlainPayload for SpliceClaimAck {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self { id: r.splice_id()? })
    }
}
