use strum::{AsRefStr, EnumIter, IntoStaticStr};

/// Closed set of message kinds, each tied to its 2-byte wire code.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, EnumIter, AsRefStr, IntoStaticStr,
)]
#[repr(u16)]
pub enum MessageCode {
    Hello = 0x0001,
    SpliceClaim = 0x0002,
    SpliceClaimAck = 0x0003,
    LoopProposal = 0x0010,
    Quit = 0x0011,
    HooksRequest = 0x0020,
    Hooks = 0x0021,
    JoinRequest = 0x0030,
    Verdict = 0x0031,
    RootContextRequest = 0x0040,
    RootContextResponse = 0x0041,
    SignatureRequest = 0x0050,
    Persons = 0x0051,
    DeferredMessages = 0x0060,
    DeferredAck = 0x0061,
    SpliceRequest = 0x0070,
    SpliceIntroduction = 0x0071,
    SpliceAccepted = 0x0072,
    SpliceError = 0x0073,
}

impl MessageCode {
    #[must_use]
    pub const fn to_wire(self) -> u16 {
        self as u16
    }
}
