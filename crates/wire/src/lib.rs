//! Binary wire codec of the overlay protocol.
//!
//! Every message is `[u16 code][payload]`, big-endian. The payload layout of
//! each kind is defined by its sub-codec (see [`payload::Payload`]) and may
//! vary with the negotiated [`ProtocolVersion`]. The set of kinds is closed
//! and listed once in [`registry`], which must be [validated](registry::validate)
//! before the first connection is served.

pub mod buf;
pub mod code;
mod error;
pub mod frame;
pub mod message;
pub mod payload;
pub mod registry;

pub use buf::{Limits, WireReader, WireWriter};
pub use code::MessageCode;
pub use error::WireError;
pub use frame::{Frame, FrameCodec};
pub use message::Message;
pub use proofnet_primitives::version::{ProtocolVersion, VersionSet};
