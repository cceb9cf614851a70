use std::net::SocketAddr;

use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::{ProtocolVersion, VersionSet};

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PlainPayload};
use crate::WireError;

/// Requester asking its broker for a connection to `target`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpliceRequest {
    pub target: NodeId,
    /// Last address the requester saw the target at, if any.
    pub address: Option<SocketAddr>,
}

impl Payload for SpliceRequest {
    const CODE: MessageCode = MessageCode::SpliceRequest;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.node_id(self.target);
        w.option(self.address.as_ref(), |w, addr| {
            w.socket_addr(*addr);
            Ok(())
        })
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)?;
        if r.bool()? {
            r.skip_socket_addr()?;
        }
        Ok(())
    }
}

impl PlainPayload for SpliceRequest {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            target: r.node_id()?,
            address: r.option(WireReader::socket_addr)?,
        })
    }
}

/// Broker telling the target to claim a splice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpliceIntroduction {
    pub id: SplicedConnectionId,
    /// Where the target should open its raw socket.
    pub broker: SocketAddr,
    pub requester: NodeId,
}

impl Payload for SpliceIntroduction {
    const CODE: MessageCode = MessageCode::SpliceIntroduction;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.splice_id(self.id);
        w.socket_addr(self.broker);
        w.node_id(self.requester);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)?;
        r.skip_socket_addr()?;
        r.skip(16)
    }
}

impl PlainPayload for SpliceIntroduction {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            id: r.splice_id()?,
            broker: r.socket_addr()?,
            requester: r.node_id()?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpliceAccepted {
    pub id: SplicedConnectionId,
}

impl Payload for SpliceAccepted {
    const CODE: MessageCode = MessageCode::SpliceAccepted;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.splice_id(self.id);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)
    }
}

impl PlainPayload for SpliceAccepted {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self { id: r.splice_id()? })
    }
}

/// Typed splice failure with a human-readable cause.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpliceError {
    pub cause: String,
}

impl Payload for SpliceError {
    const CODE: MessageCode = MessageCode::SpliceError;
    const VERSIONS: VersionSet = VersionSet::SINCE_V2;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.string(&self.cause)
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip_bytes()
    }
}

impl PlainPayload for SpliceError {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            cause: r.string()?,
        })
    }
}
