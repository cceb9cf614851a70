use proofnet_primitives::version::{ProtocolVersion, VersionSet};
use proofnet_store::Transaction;

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::message::Message;
use crate::WireError;

/// Sub-codec of one message kind.
pub trait Payload: Sized + Into<Message> {
    const CODE: MessageCode;

    /// Versions this kind can be encoded and decoded with.
    const VERSIONS: VersionSet = VersionSet::ALL;

    fn encode(&self, w: &mut WireWriter<'_>, version: ProtocolVersion) -> Result<(), WireError>;

    /// Consumes exactly the bytes [`decode`](PlainPayload::decode) would.
    fn skip(r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<(), WireError>;
}

/// Kind decoded from its bytes alone.
pub trait PlainPayload: Payload {
    fn decode(r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<Self, WireError>;
}

/// Kind whose payload is written into the store while it is decoded.
pub trait PersistedPayload: Payload {
    fn decode(
        r: &mut WireReader<'_>,
        version: ProtocolVersion,
        tx: &mut Transaction,
    ) -> Result<Self, WireError>;
}
