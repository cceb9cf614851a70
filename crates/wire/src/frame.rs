//! Stream framing on top of the message codecs.
//!
//! Messages carry no length header: a frame ends where the sub-codec's
//! `skip` says it does. The decoder therefore only yields a [`Frame`] once
//! every byte of it is buffered, which keeps reads cancel-safe.

use bytes::{BufMut, Bytes, BytesMut};
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::Transaction;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::buf::{Limits, WireReader, WireWriter};
use crate::code::MessageCode;
use crate::message::Message;
use crate::payload::Payload;
use crate::registry::{self, Registration};
use crate::WireError;

const CODE_LEN: usize = 2;

/// One complete, not yet decoded message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    code: MessageCode,
    version: ProtocolVersion,
    body: Bytes,
}

impl Frame {
    #[must_use]
    pub const fn code(&self) -> MessageCode {
        self.code
    }

    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        CODE_LEN + self.body.len()
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        registry::lookup(self.code.to_wire()).is_ok_and(Registration::is_persisted)
    }

    /// Decodes the body. Persisted kinds need `tx`; plain kinds ignore it.
    pub fn decode(
        &self,
        tx: Option<&mut Transaction>,
        limits: Limits,
    ) -> Result<Message, WireError> {
        let entry = registry::codec(self.code, self.version)?;
        let mut r = WireReader::new(&self.body, limits);
        let message = entry.decode(&mut r, self.version, tx)?;

        if !r.is_empty() {
            return Err(WireError::InvalidData("trailing bytes after message"));
        }

        Ok(message)
    }
}

/// Frames messages on a byte stream for one connection.
///
/// Until [`negotiated`](Self::negotiated) is called every kind is read and
/// written with the lowest version it supports.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec {
    version: Option<ProtocolVersion>,
    limits: Limits,
}

impl FrameCodec {
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self {
            version: None,
            limits,
        }
    }

    pub fn negotiated(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
    }

    #[must_use]
    pub const fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    fn version_for(&self, entry: &Registration) -> Result<ProtocolVersion, WireError> {
        let version = match self.version {
            Some(version) => version,
            None => entry.initial_version().ok_or(WireError::InvalidRegistry {
                code: entry.code(),
                reason: "supports no protocol version",
            })?,
        };

        if !entry.versions().contains(version) {
            return Err(WireError::UnsupportedVersion {
                code: entry.code(),
                version,
            });
        }

        Ok(version)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(code) = src.get(..CODE_LEN) else {
            return Ok(None);
        };

        let entry = registry::lookup(u16::from_be_bytes([code[0], code[1]]))?;
        let version = self.version_for(entry)?;

        let Some(payload) = src.get(CODE_LEN..) else {
            return Ok(None);
        };
        let mut r = WireReader::new(payload, self.limits);

        match entry.skip(&mut r, version) {
            Ok(()) => {}
            Err(WireError::Incomplete) => {
                if src.len() > self.limits.max_frame_len as usize {
                    return Err(WireError::LengthExceeded {
                        len: src.len() as u64,
                        max: self.limits.max_frame_len.into(),
                    });
                }
                return Ok(None);
            }
            Err(err) => return Err(err),
        }

        let len = CODE_LEN + r.position();

        if len > self.limits.max_frame_len as usize {
            return Err(WireError::LengthExceeded {
                len: len as u64,
                max: self.limits.max_frame_len.into(),
            });
        }

        let mut frame = src.split_to(len).freeze();
        let body = frame.split_off(CODE_LEN);

        trace!(code = ?entry.code(), %version, len, "framed message");

        Ok(Some(Frame {
            code: entry.code(),
            version,
            body,
        }))
    }
}

impl Encoder<&Message> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let entry = registry::lookup(item.code().to_wire())?;
        let version = self.version_for(entry)?;
        let start = dst.len();

        encode(item, version, dst)?;

        let len = dst.len() - start;
        if len > self.limits.max_frame_len as usize {
            dst.truncate(start);
            return Err(WireError::LengthExceeded {
                len: len as u64,
                max: self.limits.max_frame_len.into(),
            });
        }

        Ok(())
    }
}

/// Bytes `payload` takes on the wire once framed with `version`.
pub fn frame_len<P: Payload>(payload: &P, version: ProtocolVersion) -> Result<usize, WireError> {
    let mut body = BytesMut::new();
    payload.encode(&mut WireWriter::new(&mut body), version)?;

    Ok(CODE_LEN + body.len())
}

/// Appends `message` encoded with `version` to `dst`.
pub fn encode(
    message: &Message,
    version: ProtocolVersion,
    dst: &mut BytesMut,
) -> Result<(), WireError> {
    let _entry = registry::codec(message.code(), version)?;
    let start = dst.len();

    dst.put_u16(message.code().to_wire());

    if let Err(err) = message.encode_payload(&mut WireWriter::new(dst), version) {
        dst.truncate(start);
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/frame.rs"]
mod tests;
