use core::time::Duration;
use std::io;

use proofnet_primitives::identity::NodeId;
use proofnet_store::StoreError;
use proofnet_wire::WireError;
use thiserror::Error;

use crate::connection::ConnectionId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NetworkError {
    /// The peer broke the protocol; the connection cannot be trusted.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("connection closed by peer")]
    Closed,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("splice failed: {cause}")]
    Splice { cause: String },
    #[error("expected to reach {expected} but {actual} answered")]
    UnexpectedPeer { expected: NodeId, actual: NodeId },
    #[error("no live connection to {0}")]
    NotConnected(NodeId),
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),
    #[error("{0} is not available at the negotiated protocol version")]
    Unsupported(&'static str),
    #[error("no live connection")]
    NoConnection,
    #[error("invalid node configuration: {0}")]
    Config(&'static str),
    #[error("message of {len} bytes does not fit the frame limit of {max}")]
    TooLarge { len: usize, max: u32 },
}

impl NetworkError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }

    pub(crate) fn splice(cause: impl Into<String>) -> Self {
        Self::Splice {
            cause: cause.into(),
        }
    }

    /// Whether the connection that produced this error has to be closed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Protocol(_)
            | Self::Io(_)
            | Self::Closed
            | Self::UnexpectedPeer { .. } => true,
            Self::Wire(err) => !matches!(err, WireError::Store(_)),
            Self::Timeout(_)
            | Self::Store(_)
            | Self::Splice { .. }
            | Self::NotConnected(_)
            | Self::ConnectionGone(_)
            | Self::NoConnection
            | Self::Config(_)
            | Self::TooLarge { .. }
            | Self::Unsupported(_) => false,
        }
    }
}
