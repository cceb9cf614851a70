//! Peer-to-peer overlay protocol engine.
//!
//! Nodes are either [`FemaleNode`]s, which accept connections, or
//! [`MaleNode`]s, which only dial out. Every connection opens with a
//! handshake and then runs a loop in which both ends propose the next
//! dialog, agree on one and run it to completion.

mod connection;
pub mod config;
pub(crate) mod dialog;
mod error;
mod node;
pub mod outcome;
pub mod phase;
pub mod selector;
pub mod services;
pub mod splice;
mod transport;

pub use config::NodeConfig;
pub use connection::{ConnectionId, ConnectionInfo, PeerInfo};
pub use error::NetworkError;
pub use node::{FemaleNode, MaleNode, PeerToPeerNode};
pub use outcome::{Outcome, Rejection};
pub use services::{AcceptAll, Cipher, ContextProvider, InboundHandler, PlainCipher, Services};
pub use transport::Transport;
