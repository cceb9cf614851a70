use proofnet_primitives::version::ProtocolVersion;

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PlainPayload};
use crate::WireError;

/// Dialogs that can be proposed in a connection's loop.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum LoopDialogType {
    Idle = 0,
    Quit = 1,
    Hooks = 2,
    Join = 3,
    RootContext = 4,
    Signature = 5,
    Persons = 6,
    Deferred = 7,
    SpliceRequest = 8,
    SpliceIntroduction = 9,
}

impl LoopDialogType {
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Idle,
            1 => Self::Quit,
            2 => Self::Hooks,
            3 => Self::Join,
            4 => Self::RootContext,
            5 => Self::Signature,
            6 => Self::Persons,
            7 => Self::Deferred,
            8 => Self::SpliceRequest,
            9 => Self::SpliceIntroduction,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    /// Whether a connection running `version` may select this dialog.
    #[must_use]
    pub const fn is_supported(self, version: ProtocolVersion) -> bool {
        match self {
            Self::SpliceRequest | Self::SpliceIntroduction => {
                version.get() >= ProtocolVersion::V2.get()
            }
            _ => true,
        }
    }
}

/// One side's choice for the next loop dialog.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoopProposal {
    pub dialog: LoopDialogType,
}

impl Payload for LoopProposal {
    const CODE: MessageCode = MessageCode::LoopProposal;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.u8(self.dialog.to_wire());

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(1)
    }
}

impl PlainPayload for LoopProposal {
    fn decode(r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<Self, WireError> {
        let dialog = LoopDialogType::from_wire(r.u8()?)
            .ok_or(WireError::InvalidData("unknown loop dialog type"))?;

        if !dialog.is_supported(version) {
            return Err(WireError::InvalidData(
                "loop dialog type not available at this version",
            ));
        }

        Ok(Self { dialog })
    }
}

/// Graceful close.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quit;

impl Payload for Quit {
    const CODE: MessageCode = MessageCode::Quit;

    fn encode(&self, _w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        Ok(())
    }

    fn skip(_r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        Ok(())
    }
}

impl PlainPayload for Quit {
    fn decode(_r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self)
    }
}

/// Accept/reject answer shared by the join and delivery dialogs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    pub cause: Option<String>,
}

impl Verdict {
    #[must_use]
    pub const fn accept() -> Self {
        Self {
            accepted: true,
            cause: None,
        }
    }

    pub fn reject(cause: impl Into<String>) -> Self {
        Self {
            accepted: false,
            cause: Some(cause.into()),
        }
    }
}

impl Payload for Verdict {
    const CODE: MessageCode = MessageCode::Verdict;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.bool(self.accepted);
        w.option(self.cause.as_deref(), WireWriter::string)
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip(1)?;
        if r.bool()? {
            r.skip_bytes()?;
        }
        Ok(())
    }
}

impl PlainPayload for Verdict {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            accepted: r.bool()?,
            cause: r.option(WireReader::string)?,
        })
    }
}
