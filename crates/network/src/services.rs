//! Collaborators the engine calls out to without knowing their internals.

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use proofnet_primitives::context::ContextId;
use proofnet_primitives::identity::NodeId;
use proofnet_store::object::{self, StoredObject};
use proofnet_store::{Store, StoreError};
use tracing::debug;

use crate::outcome::Rejection;

/// Answers root context lookups coming from peers.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn root_context(&self, context: ContextId) -> Result<Option<StoredObject>, StoreError>;
}

/// Serves root contexts straight from the local store.
#[derive(Clone, Debug)]
pub struct StoreContextProvider {
    store: Store,
}

impl StoreContextProvider {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContextProvider for StoreContextProvider {
    async fn root_context(&self, context: ContextId) -> Result<Option<StoredObject>, StoreError> {
        object::find_root_context(&mut self.store.begin(), context)
    }
}

/// Receives unicast payloads addressed to this node.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// `sender` is unknown when the payload arrived through a relay.
    async fn signature_request(
        &self,
        sender: Option<NodeId>,
        payload: Vec<u8>,
    ) -> Result<(), Rejection>;

    async fn persons(
        &self,
        sender: Option<NodeId>,
        persons: Vec<StoredObject>,
    ) -> Result<(), Rejection>;
}

/// Accepts everything and only logs it.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

#[async_trait]
impl InboundHandler for AcceptAll {
    async fn signature_request(
        &self,
        sender: Option<NodeId>,
        payload: Vec<u8>,
    ) -> Result<(), Rejection> {
        debug!(?sender, len = payload.len(), "accepted signature request");
        Ok(())
    }

    async fn persons(
        &self,
        sender: Option<NodeId>,
        persons: Vec<StoredObject>,
    ) -> Result<(), Rejection> {
        debug!(?sender, count = persons.len(), "accepted persons");
        Ok(())
    }
}

/// Opaque cipher applied to signature request payloads.
pub trait Cipher: Send + Sync {
    fn cipher(&self, recipient: NodeId, plain: Vec<u8>) -> Vec<u8>;

    /// `None` when the payload cannot be deciphered.
    fn decipher(&self, ciphered: Vec<u8>) -> Option<Vec<u8>>;
}

/// Identity cipher.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainCipher;

impl Cipher for PlainCipher {
    fn cipher(&self, _recipient: NodeId, plain: Vec<u8>) -> Vec<u8> {
        plain
    }

    fn decipher(&self, ciphered: Vec<u8>) -> Option<Vec<u8>> {
        Some(ciphered)
    }
}

#[derive(Clone)]
pub struct Services {
    pub context: Arc<dyn ContextProvider>,
    pub inbound: Arc<dyn InboundHandler>,
    pub cipher: Arc<dyn Cipher>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    /// Store-backed lookups, accept-all delivery, no ciphering.
    #[must_use]
    pub fn with_store(store: Store) -> Self {
        Self {
            context: Arc::new(StoreContextProvider::new(store)),
            inbound: Arc::new(AcceptAll),
            cipher: Arc::new(PlainCipher),
        }
    }

    #[must_use]
    pub fn context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn inbound(mut self, inbound: Arc<dyn InboundHandler>) -> Self {
        self.inbound = inbound;
        self
    }

    #[must_use]
    pub fn cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = cipher;
        self
    }
}
