//! The closed set of message kinds.

mod content;
mod control;
mod deferred;
mod handshake;
mod hooks;
mod splice;

pub use content::{Persons, RootContextRequest, RootContextResponse, SignatureRequest};
pub use control::{LoopDialogType, LoopProposal, Quit, Verdict};
pub use deferred::{DeferredAck, DeferredMessages};
pub use handshake::{Hello, SpliceClaim, SpliceClaimAck};
pub use hooks::{HookAddress, Hooks, HooksRequest, JoinRequest};
pub use splice::{SpliceAccepted, SpliceError, SpliceIntroduction, SpliceRequest};

use proofnet_primitives::version::ProtocolVersion;

use crate::buf::WireWriter;
use crate::code::MessageCode;
use crate::payload::Payload;
use crate::registry::Registration;
use crate::WireError;

macro_rules! messages {
    ($($kind:ident => $flavour:ident,)*) => {
        /// Tagged union over every message kind.
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub enum Message {
            $($kind($kind),)*
        }

        impl Message {
            #[must_use]
            pub const fn code(&self) -> MessageCode {
                match self {
                    $(Self::$kind(_) => <$kind as Payload>::CODE,)*
                }
            }

            pub(crate) fn encode_payload(
                &self,
                w: &mut WireWriter<'_>,
                version: ProtocolVersion,
            ) -> Result<(), WireError> {
                match self {
                    $(Self::$kind(message) => message.encode(w, version),)*
                }
            }
        }

        $(
            impl From<$kind> for Message {
                fn from(message: $kind) -> Self {
                    Self::$kind(message)
                }
            }
        )*

        pub(crate) static REGISTRATIONS: &[Registration] = &[
            $(Registration::$flavour::<$kind>(),)*
        ];
    };
}

messages! {
    Hello => plain,
    SpliceClaim => plain,
    SpliceClaimAck => plain,
    LoopProposal => plain,
    Quit => plain,
    HooksRequest => plain,
    Hooks => plain,
    JoinRequest => plain,
    Verdict => plain,
    RootContextRequest => plain,
    RootContextResponse => persisted,
    SignatureRequest => plain,
    Persons => persisted,
    DeferredMessages => persisted,
    DeferredAck => plain,
    SpliceRequest => plain,
    SpliceIntroduction => plain,
    SpliceAccepted => plain,
    SpliceError => plain,
}

impl Message {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.code().into()
    }
}

#[cfg(test)]
#[path = "tests/message.rs"]
mod tests;
