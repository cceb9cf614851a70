//! Big-endian primitive readers and writers shared by every payload codec.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{BufMut, BytesMut};
use proofnet_primitives::context::ContextId;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::hash::Hash;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::VersionSet;

use crate::WireError;

const HASH_LEN: usize = 32;

/// Bounds applied to attacker-controlled lengths.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    /// Largest frame, and so largest single byte string, accepted.
    pub max_frame_len: u32,
    /// Largest element count accepted for any array.
    pub max_array_len: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_len: 16 * 1024 * 1024,
            max_array_len: 64 * 1024,
        }
    }
}

#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn bool(&mut self, value: bool) {
        self.u8(value.into());
    }

    pub fn uuid_parts(&mut self, (most, least): (u64, u64)) {
        self.u64(most);
        self.u64(least);
    }

    pub fn node_id(&mut self, id: NodeId) {
        self.uuid_parts(id.to_parts());
    }

    pub fn context_id(&mut self, id: ContextId) {
        self.uuid_parts(id.to_parts());
    }

    pub fn splice_id(&mut self, id: SplicedConnectionId) {
        self.uuid_parts(id.to_parts());
    }

    pub fn hash(&mut self, hash: &Hash) {
        self.buf.put_slice(hash.as_bytes());
    }

    pub fn gender(&mut self, gender: Gender) {
        self.u8(gender.to_wire());
    }

    pub fn version_set(&mut self, versions: VersionSet) {
        self.u32(versions.bits());
    }

    /// Writes a 4-byte element count.
    pub fn count(&mut self, len: usize) -> Result<(), WireError> {
        let len = u32::try_from(len).map_err(|_| WireError::LengthExceeded {
            len: len as u64,
            max: u32::MAX.into(),
        })?;

        self.u32(len);

        Ok(())
    }

    pub fn bytes(&mut self, value: &[u8]) -> Result<(), WireError> {
        self.count(value.len())?;
        self.buf.put_slice(value);

        Ok(())
    }

    pub fn string(&mut self, value: &str) -> Result<(), WireError> {
        self.bytes(value.as_bytes())
    }

    pub fn socket_addr(&mut self, addr: SocketAddr) {
        match addr.ip() {
            IpAddr::V4(ip) => {
                self.u8(4);
                self.buf.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                self.u8(6);
                self.buf.put_slice(&ip.octets());
            }
        }

        self.u16(addr.port());
    }

    /// Writes a presence flag, then the value if present.
    pub fn option<T>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Self, &T) -> Result<(), WireError>,
    ) -> Result<(), WireError>
    where
        T: ?Sized,
    {
        self.bool(value.is_some());

        match value {
            Some(value) => write(self, value),
            None => Ok(()),
        }
    }
}

/// Cursor over a received buffer. Running out of input yields
/// [`WireError::Incomplete`] and leaves the caller free to retry once more
/// bytes arrive.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    limits: Limits,
}

impl<'a> WireReader<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8], limits: Limits) -> Self {
        Self {
            buf,
            pos: 0,
            limits,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Incomplete)?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Incomplete)?;
        self.pos = end;

        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);

        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), WireError> {
        self.take(len).map(drop)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        self.array::<1>().map(|[byte]| byte)
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, WireError> {
        self.array().map(u64::from_be_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, WireError> {
        self.array().map(i64::from_be_bytes)
    }

    pub fn bool(&mut self) -> Result<bool, WireError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(WireError::InvalidData("presence flag is neither 0 nor 1")),
        }
    }

    pub fn uuid_parts(&mut self) -> Result<(u64, u64), WireError> {
        Ok((self.u64()?, self.u64()?))
    }

    pub fn node_id(&mut self) -> Result<NodeId, WireError> {
        let (most, least) = self.uuid_parts()?;

        Ok(NodeId::from_parts(most, least))
    }

    pub fn context_id(&mut self) -> Result<ContextId, WireError> {
        let (most, least) = self.uuid_parts()?;

        Ok(ContextId::from_parts(most, least))
    }

    pub fn splice_id(&mut self) -> Result<SplicedConnectionId, WireError> {
        let (most, least) = self.uuid_parts()?;

        Ok(SplicedConnectionId::from_parts(most, least))
    }

    pub fn hash(&mut self) -> Result<Hash, WireError> {
        self.array::<HASH_LEN>().map(Hash::from)
    }

    pub fn gender(&mut self) -> Result<Gender, WireError> {
        Gender::from_wire(self.u8()?).ok_or(WireError::InvalidData("unknown gender"))
    }

    pub fn version_set(&mut self) -> Result<VersionSet, WireError> {
        self.u32().map(VersionSet::from_bits)
    }

    /// Reads a 4-byte element count, rejecting counts above the array limit.
    pub fn count(&mut self) -> Result<usize, WireError> {
        let len = self.u32()?;

        if len > self.limits.max_array_len {
            return Err(WireError::LengthExceeded {
                len: len.into(),
                max: self.limits.max_array_len.into(),
            });
        }

        Ok(len as usize)
    }

    fn byte_len(&mut self) -> Result<usize, WireError> {
        let len = self.u32()?;

        if len > self.limits.max_frame_len {
            return Err(WireError::LengthExceeded {
                len: len.into(),
                max: self.limits.max_frame_len.into(),
            });
        }

        Ok(len as usize)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.byte_len()?;

        self.take(len).map(<[u8]>::to_vec)
    }

    pub fn skip_bytes(&mut self) -> Result<(), WireError> {
        let len = self.byte_len()?;

        self.skip(len)
    }

    pub fn string(&mut self) -> Result<String, WireError> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    pub fn socket_addr(&mut self) -> Result<SocketAddr, WireError> {
        let ip = match self.u8()? {
            4 => IpAddr::V4(Ipv4Addr::from(self.array::<4>()?)),
            6 => IpAddr::V6(Ipv6Addr::from(self.array::<16>()?)),
            _ => return Err(WireError::InvalidData("unknown address family")),
        };

        Ok(SocketAddr::new(ip, self.u16()?))
    }

    pub fn skip_socket_addr(&mut self) -> Result<(), WireError> {
        match self.u8()? {
            4 => self.skip(4 + 2),
            6 => self.skip(16 + 2),
            _ => Err(WireError::InvalidData("unknown address family")),
        }
    }

    /// Reads a presence flag, then the value if present.
    pub fn option<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<Option<T>, WireError> {
        if self.bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "tests/buf.rs"]
mod tests;
