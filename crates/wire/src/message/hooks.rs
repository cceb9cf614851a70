use std::net::SocketAddr;

use proofnet_primitives::version::ProtocolVersion;

use crate::buf::{WireReader, WireWriter};
use crate::code::MessageCode;
use crate::payload::{Payload, PlainPayload};
use crate::WireError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HooksRequest;

impl Payload for HooksRequest {
    const CODE: MessageCode = MessageCode::HooksRequest;

    fn encode(&self, _w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        Ok(())
    }

    fn skip(_r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        Ok(())
    }
}

impl PlainPayload for HooksRequest {
    fn decode(_r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self)
    }
}

/// A known address of a node accepting connections.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HookAddress {
    pub address: SocketAddr,
    /// Zero when the peer speaks version 1, which does not carry it.
    pub last_success_millis: i64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hooks {
    pub hooks: Vec<HookAddress>,
}

impl Payload for Hooks {
    const CODE: MessageCode = MessageCode::Hooks;

    fn encode(&self, w: &mut WireWriter<'_>, version: ProtocolVersion) -> Result<(), WireError> {
        w.count(self.hooks.len())?;

        for hook in &self.hooks {
            w.socket_addr(hook.address);
            if version >= ProtocolVersion::V2 {
                w.i64(hook.last_success_millis);
            }
        }

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<(), WireError> {
        for _ in 0..r.count()? {
            r.skip_socket_addr()?;
            if version >= ProtocolVersion::V2 {
                r.skip(8)?;
            }
        }

        Ok(())
    }
}

impl PlainPayload for Hooks {
    fn decode(r: &mut WireReader<'_>, version: ProtocolVersion) -> Result<Self, WireError> {
        let count = r.count()?;
        let mut hooks = Vec::with_capacity(count.min(r.remaining()));

        for _ in 0..count {
            let address = r.socket_addr()?;
            let last_success_millis = if version >= ProtocolVersion::V2 {
                r.i64()?
            } else {
                0
            };

            hooks.push(HookAddress {
                address,
                last_success_millis,
            });
        }

        Ok(Self { hooks })
    }
}

/// A Female announcing the address it believes it is reachable at.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinRequest {
    pub listen_address: SocketAddr,
}

impl Payload for JoinRequest {
    const CODE: MessageCode = MessageCode::JoinRequest;

    fn encode(&self, w: &mut WireWriter<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        w.socket_addr(self.listen_address);

        Ok(())
    }

    fn skip(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<(), WireError> {
        r.skip_socket_addr()
    }
}

impl PlainPayload for JoinRequest {
    fn decode(r: &mut WireReader<'_>, _version: ProtocolVersion) -> Result<Self, WireError> {
        Ok(Self {
            listen_address: r.socket_addr()?,
        })
    }
}
