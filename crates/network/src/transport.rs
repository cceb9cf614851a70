//! Framed message stream of one connection.

use core::time::Duration;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::{Store, StoreError, Transaction, DEFAULT_RETRIES};
use proofnet_wire::message::LoopDialogType;
use proofnet_wire::{Frame, FrameCodec, Limits, Message, MessageCode};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, FramedParts};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::NetworkError;

pub(crate) type FramedStream = Framed<TcpStream, FrameCodec>;

#[derive(Debug)]
pub struct Transport {
    framed: FramedStream,
    peer_addr: SocketAddr,
    budget: Duration,
}

impl Transport {
    pub fn new(stream: TcpStream, limits: Limits, budget: Duration) -> Result<Self, NetworkError> {
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        Ok(Self::from_framed(
            Framed::new(stream, FrameCodec::new(limits)),
            peer_addr,
            budget,
        ))
    }

    pub(crate) const fn from_framed(
        framed: FramedStream,
        peer_addr: SocketAddr,
        budget: Duration,
    ) -> Self {
        Self {
            framed,
            peer_addr,
            budget,
        }
    }

    /// Splits off the socket together with any bytes read but not framed.
    pub(crate) fn into_parts(self) -> FramedParts<TcpStream, FrameCodec> {
        self.framed.into_parts()
    }

    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    #[must_use]
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.framed.codec().version()
    }

    pub fn negotiated(&mut self, version: ProtocolVersion) {
        self.framed.codec_mut().negotiated(version);
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.framed.codec().limits()
    }

    pub async fn send(&mut self, message: impl Into<Message>) -> Result<(), NetworkError> {
        let message = message.into();

        trace!(peer=%self.peer_addr, message = message.name(), "sending");

        timeout(self.budget, self.framed.send(&message))
            .await
            .map_err(|_| NetworkError::Timeout(self.budget))??;

        Ok(())
    }

    /// Next complete frame, bounded by the dialog budget.
    pub async fn recv_frame(&mut self) -> Result<Frame, NetworkError> {
        timeout(self.budget, self.next_frame())
            .await
            .map_err(|_| NetworkError::Timeout(self.budget))?
    }

    pub(crate) async fn recv_frame_unbounded(&mut self) -> Result<Frame, NetworkError> {
        self.next_frame().await
    }

    async fn next_frame(&mut self) -> Result<Frame, NetworkError> {
        match self.framed.next().await {
            Some(frame) => Ok(frame?),
            None => Err(NetworkError::Closed),
        }
    }

    /// Like [`recv_frame`](Self::recv_frame) but gives up with `None` as soon
    /// as `cancel` fires. Nothing is lost from the stream when that happens.
    pub async fn recv_frame_or_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Frame>, NetworkError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            frame = self.recv_frame() => frame.map(Some),
        }
    }

    pub fn decode(
        &self,
        frame: &Frame,
        tx: Option<&mut Transaction>,
    ) -> Result<Message, NetworkError> {
        Ok(frame.decode(tx, self.limits())?)
    }

    /// Reads the peer's next loop proposal.
    ///
    /// Frames left on the stream by a dialog this side abandoned are skipped.
    /// The peer may still be finishing that dialog, so the wait is allowed
    /// twice the dialog budget.
    pub async fn recv_proposal(&mut self) -> Result<LoopDialogType, NetworkError> {
        let budget = self.budget.saturating_mul(2);

        timeout(budget, self.next_proposal())
            .await
            .map_err(|_| NetworkError::Timeout(budget))?
    }

    async fn next_proposal(&mut self) -> Result<LoopDialogType, NetworkError> {
        loop {
            let frame = self.next_frame().await?;

            if frame.code() != MessageCode::LoopProposal {
                debug!(
                    peer=%self.peer_addr,
                    code=?frame.code(),
                    len=frame.len(),
                    "skipping stray frame"
                );
                continue;
            }

            let Message::LoopProposal(proposal) = self.decode(&frame, None)? else {
                return Err(NetworkError::protocol("loop proposal decoded as another kind"));
            };

            return Ok(proposal.dialog);
        }
    }

    /// Resolves once the peer has sent something or closed the stream.
    pub async fn readable(&self) -> Result<(), NetworkError> {
        if !self.framed.read_buffer().is_empty() {
            return Ok(());
        }

        self.framed.get_ref().readable().await?;

        Ok(())
    }
}

/// Runs `f` in a transaction and commits it, retrying on conflicts.
pub(crate) fn persist<T>(
    store: &Store,
    mut f: impl FnMut(&mut Transaction) -> Result<T, NetworkError>,
) -> Result<T, NetworkError> {
    let mut attempt = 0;

    loop {
        let mut tx = store.begin();
        let value = f(&mut tx)?;

        match tx.commit() {
            Ok(_) => return Ok(value),
            Err(StoreError::Conflict) if attempt < DEFAULT_RETRIES => {
                attempt += 1;
                trace!(attempt, "retrying conflicting transaction");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Expects `message` to be of the `$kind` variant, failing with a protocol
/// error otherwise.
macro_rules! expect_message {
    ($message:expr, $kind:ident) => {
        match $message {
            proofnet_wire::Message::$kind(inner) => inner,
            other => {
                return Err($crate::NetworkError::protocol(format!(
                    "expected {}, got {}",
                    stringify!($kind),
                    other.name()
                )))
            }
        }
    };
}

pub(crate) use expect_message;
