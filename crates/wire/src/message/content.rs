use proofnet_primitives::context::ContextId;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::object::{self, ObjectKind, StoredObject};
use proofnet_store::Transaction;

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PersistedPayload, PlainPayload};
use crate::WireError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RootContextRequest {
    pub context: ContextId,
}

impl Payload for RootContextRequest {
    const CODE: MessageCode = MessageCode::RootContextRequest;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.context_id(self.context);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)
    }
}

impl PlainPayload for RootContextRequest {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            context: r.context_id()?,
        })
    }
}

/// Answer to [`RootContextRequest`]. Decoding stores the object and binds it
/// to the context in the receiving transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RootContextResponse {
    pub context: ContextId,
    pub object: Option<StoredObject>,
}

impl Payload for RootContextResponse {
    const CODE: MessageCode = MessageCode::RootContextResponse;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.context_id(self.context);
        w.option(self.object.as_ref(), |w, object| w.bytes(object.data()))
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16)?;
        if r.bool()? {
            r.skip_bytes()?;
        }
        Ok(())
    }
}

impl PersistedPayload for RootContextResponse {
    fn decode(
        r: &mut WireReader<'_>,
        _version: ProtocolVersion,
        tx: &mut Transaction,
    ) -> Result<Self, WireError> {
        let context = r.context_id()?;
        let Some(data) = r.option(WireReader::bytes)? else {
            return Ok(Self {
                context,
                object: None,
            });
        };

        let _id = object::publish_root_context(tx, context, data.clone())?;

        Ok(Self {
            context,
            object: Some(StoredObject::new(ObjectKind::RootContext, data)),
        })
    }
}

/// Unicast signature request. The payload is opaque ciphertext.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureRequest {
    pub sender: NodeId,
    pub recipient: NodeId,
    pub ciphered: Vec<u8>,
}

impl Payload for SignatureRequest {
    const CODE: MessageCode = MessageCode::SignatureRequest;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.node_id(self.sender);
        w.node_id(self.recipient);
        w.bytes(&self.ciphered)
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16 + 16)?;
        r.skip_bytes()
    }
}

impl PlainPayload for SignatureRequest {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            sender: r.node_id()?,
            recipient: r.node_id()?,
            ciphered: r.bytes()?,
        })
    }
}

/// Unicast person records, stored as objects on receipt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Persons {
    pub sender: NodeId,
    pub recipient: NodeId,
    pub persons: Vec<StoredObject>,
}

impl Payload for Persons {
    const CODE: MessageCode = MessageCode::Persons;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.node_id(self.sender);
        w.node_id(self.recipient);
        w.count(self.persons.len())?;

        for person in &self.persons {
            w.bytes(person.data())?;
        }

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(16 + 16)?;
        for _ in 0..r.count()? {
            r.skip_bytes()?;
        }
        Ok(())
    }
}

impl PersistedPayload for Persons {
    fn decode(
        r: &mut WireReader<'_>,
        _version: ProtocolVersion,
        tx: &mut Transaction,
    ) -> Result<Self, WireError> {
        let sender = r.node_id()?;
        let recipient = r.node_id()?;
        let count = r.count()?;
        let mut persons = Vec::with_capacity(count.min(r.remaining()));

        for _ in 0..count {
            let person = StoredObject::new(ObjectKind::Person, r.bytes()?);
            let _id = object::put(tx, &person)?;
            persons.push(person);
        }

        Ok(Self {
            sender,
            recipient,
            persons,
        })
    }
}
