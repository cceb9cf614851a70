use proofnet_primitives::hash::Hash;
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::deferred::{DeferredKind, DeferredMessage};
use proofnet_store::Transaction;

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PersistedPayload, PlainPayload};
use crate::WireError;

const ENTRY_FIXED_LEN: usize = 16 + 8 + 1;

/// Store-and-forward batch. Decoding stores every message; the receiving
/// dialog must take a holding of each in the same transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeferredMessages {
    pub messages: Vec<DeferredMessage>,
}

impl DeferredMessages {
    /// Frame bytes of an empty batch: code and count.
    pub const HEADER_LEN: usize = 2 + 4;

    /// Frame bytes one message with `content_len` bytes of content adds.
    #[must_use]
    pub const fn entry_len(content_len: usize) -> usize {
        ENTRY_FIXED_LEN + 4 + content_len
    }
}

impl Payload for DeferredMessages {
    const CODE: MessageCode = MessageCode::DeferredMessages;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.count(self.messages.len())?;

        for message in &self.messages {
            w.node_id(message.recipient());
            w.i64(message.date());
            w.u8(message.kind().to_wire());
            w.bytes(message.content())?;
        }

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        for _ in 0..r.count()? {
            r.skip(ENTRY_FIXED_LEN)?;
            r.skip_bytes()?;
        }

        Ok(())
    }
}

impl PersistedPayload for DeferredMessages {
    fn decode(
        r: &mut WireReader<'_>,
        _version: ProtocolVersion,
        tx: &mut Transaction,
    ) -> Result<Self, WireError> {
        let count = r.count()?;
        let mut messages = Vec::with_capacity(count.min(r.remaining()));

        for _ in 0..count {
            let recipient = r.node_id()?;
            let date = r.i64()?;
            let kind = DeferredKind::from_wire(r.u8()?)
                .ok_or(WireError::InvalidData("unknown deferred message kind"))?;
            let message = DeferredMessage::new(recipient, date, kind, r.bytes()?);

            if !tx.contains::<DeferredMessage>(&message.digest())? {
                tx.put(&message)?;
            }

            messages.push(message);
        }

        Ok(Self { messages })
    }
}

/// Digests of the deferred messages the receiver took over.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeferredAck {
    pub ids: Vec<Hash>,
}

impl Payload for DeferredAck {
    const CODE: MessageCode = MessageCode::DeferredAck;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.count(self.ids.len())?;

        for id in &self.ids {
            w.hash(id);
        }

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        let count = r.count()?;

        r.skip(count * 32)
    }
}

impl PlainPayload for DeferredAck {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        let count = r.count()?;
        let mut ids = Vec::with_capacity(count.min(r.remaining()));

        for _ in 0..count {
            ids.push(r.hash()?);
        }

        Ok(Self { ids })
    }
}
