use std::io;

use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::StoreError;
use thiserror::Error;

use crate::code::MessageCode;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WireError {
    /// More bytes are needed before the value can be read.
    #[error("incomplete input")]
    Incomplete,
    #[error("unknown message code {0:#06x}")]
    UnknownCode(u16),
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    #[error("length {len} exceeds the limit of {max}")]
    LengthExceeded { len: u64, max: u64 },
    #[error("{code:?} has no codec for protocol version {version}")]
    UnsupportedVersion {
        code: MessageCode,
        version: ProtocolVersion,
    },
    #[error("{0:?} is persisted and needs a transaction to decode")]
    MissingTransaction(MessageCode),
    #[error("invalid message registry entry for {code:?}: {reason}")]
    InvalidRegistry {
        code: MessageCode,
        reason: &'static str,
    },
    #[error("invalid utf-8 string")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WireError {
    /// Whether the error was caused by an oversized length prefix or frame.
    #[must_use]
    pub const fn is_resource(&self) -> bool {
        matches!(self, Self::LengthExceeded { .. })
    }
}
