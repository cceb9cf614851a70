//! Male and Female overlay nodes.
//!
//! A node owns its connections, each driven by its own task, plus an accept
//! loop (Female only) and a maintenance task. Everything runs under one
//! [`TaskTracker`] and stops when the node's [`CancellationToken`] fires.

use core::fmt;
use core::ops::Deref;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use proofnet_primitives::context::ContextId;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::time::now_millis;
use proofnet_store::deferred::{self, DeferredKind, DeferredMessage};
use proofnet_store::hook::{self, Hook};
use proofnet_store::object::{self, StoredObject};
use proofnet_store::{Change, ChangeKind, Column, Store, StoreListener};
use proofnet_wire::message::{Persons, SignatureRequest, SpliceClaim, SpliceClaimAck, SpliceError};
use proofnet_wire::{registry, Frame, MessageCode};
use tokio::io::{copy_bidirectional, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::connection::{establish, ConnectionHandle, ConnectionId, ConnectionInfo, Setup, Work};
use crate::dialog::delivery::{
    encode_persons, ensure_deferrable, ensure_fits, persons_content_len,
};
use crate::dialog::splice::{await_pairing, claim};
use crate::outcome::Outcome;
use crate::phase::{PhaseInfo, PhaseTracker, PhaseType};
use crate::services::Services;
use crate::splice::{Claim, SpliceRegistry};
use crate::transport::{expect_message, persist, Transport};
use crate::NetworkError;

/// State shared by the node handle and all of its tasks.
pub(crate) struct Shared {
    pub config: NodeConfig,
    pub store: Store,
    pub services: Services,
    pub splices: SpliceRegistry<Transport>,
    pub token: CancellationToken,
    pub tracker: TaskTracker,
    connections: RwLock<BTreeMap<ConnectionId, ConnectionHandle>>,
    closed: Notify,
    listen_address: Option<SocketAddr>,
    next_id: AtomicU64,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("node_id", &self.config.node_id)
            .field("gender", &self.config.network.gender)
            .field("listen_address", &self.listen_address)
            .field("connections", &self.handles().len())
            .finish_non_exhaustive()
    }
}

impl Shared {
    pub const fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub const fn gender(&self) -> Gender {
        self.config.network.gender
    }

    /// Address announced to peers; only Female nodes have one.
    pub fn public_address(&self) -> Option<SocketAddr> {
        match self.gender() {
            Gender::Female => self.config.network.public_address.or(self.listen_address),
            Gender::Male => None,
        }
    }

    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, handle: ConnectionHandle) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        drop(connections.insert(handle.id(), handle));
    }

    pub(crate) fn unregister(&self, id: ConnectionId) {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        drop(removed);
        self.closed.notify_waiters();
    }

    fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn find(&self, f: impl Fn(&ConnectionInfo) -> bool) -> Option<ConnectionHandle> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|handle| f(handle.info()))
            .cloned()
    }

    pub(crate) fn connection_to(&self, node: NodeId) -> Option<ConnectionHandle> {
        self.find(|info| info.peer == node)
    }

    fn connection_at(&self, address: SocketAddr) -> Option<ConnectionHandle> {
        self.find(|info| info.reaches(address))
    }

    /// Some live connection, Female peers first.
    fn any_connection(&self) -> Option<ConnectionHandle> {
        self.find(|info| info.gender == Gender::Female)
            .or_else(|| self.find(|_| true))
    }

    fn wake_all(&self) {
        for handle in self.handles() {
            handle.wake();
        }
    }

    /// Resolves once no connection is registered.
    async fn drained(&self) {
        loop {
            let closed = self.closed.notified();

            if self.handles().is_empty() {
                return;
            }

            closed.await;
        }
    }

    /// Dials `address` and establishes a connection on the new socket.
    pub(crate) async fn open(
        self: &Arc<Self>,
        address: SocketAddr,
        expected: Option<NodeId>,
    ) -> Result<ConnectionHandle, NetworkError> {
        let connect = self.config.timeouts.connect;
        let stream = timeout(connect, TcpStream::connect(address))
            .await
            .map_err(|_| NetworkError::Timeout(connect))??;

        let transport = Transport::new(
            stream,
            self.config.limits.wire(),
            self.config.timeouts.dialog,
        )?;

        establish(
            self,
            transport,
            Setup {
                direction: Gender::Male,
                expected,
                first: None,
                spliced: false,
            },
        )
        .await
    }

    /// Broker side: asks `target` to claim splice `id` at `broker`,
    /// connecting to it first when it is not connected already.
    pub(crate) async fn introduce(
        self: &Arc<Self>,
        id: SplicedConnectionId,
        broker: SocketAddr,
        requester: NodeId,
        target: NodeId,
        address: Option<SocketAddr>,
    ) -> Result<Outcome<()>, NetworkError> {
        let handle = match (self.connection_to(target), address) {
            (Some(handle), _) => handle,
            (None, Some(address)) => self.open(address, Some(target)).await?,
            (None, None) => return Err(NetworkError::NotConnected(target)),
        };

        let timeouts = &self.config.timeouts;
        let budget = timeouts.dialog.saturating_mul(2) + timeouts.connect;
        let cancel = CancellationToken::new();
        let work = |reply| Work::Introduce {
            id,
            broker,
            requester,
            reply,
        };

        if let Ok(outcome) = timeout(budget, handle.submit(work, &cancel)).await {
            outcome
        } else {
            cancel.cancel();
            Err(NetworkError::Timeout(budget))
        }
    }

    /// Target side: waits for the broker to pair the claim on `transport`,
    /// then runs the spliced connection to `requester`.
    pub(crate) fn spawn_spliced(
        self: &Arc<Self>,
        mut transport: Transport,
        id: SplicedConnectionId,
        requester: NodeId,
    ) {
        let shared = Arc::clone(self);

        drop(self.tracker.spawn(async move {
            let result = async {
                await_pairing(&shared, &mut transport, id).await?;

                establish(
                    &shared,
                    transport,
                    Setup {
                        direction: Gender::Female,
                        expected: Some(requester),
                        first: None,
                        spliced: true,
                    },
                )
                .await
            }
            .await;

            match result {
                Ok(handle) => {
                    info!(%id, connection=%handle.id(), %requester, "spliced connection ready");
                }
                Err(err) => warn!(%id, %requester, %err, "spliced connection failed"),
            }
        }));
    }

    /// Tries hooks best first until one connects.
    pub(crate) async fn connect_hooks(
        self: &Arc<Self>,
    ) -> Result<Option<ConnectionInfo>, NetworkError> {
        let hooks = hook::by_priority(&mut self.store.begin())?;
        let own = self.public_address();

        for candidate in hooks {
            let address = candidate.address();

            if Some(address) == own {
                continue;
            }

            if let Some(handle) = self.connection_at(address) {
                return Ok(Some(handle.info().clone()));
            }

            match self.open(address, None).await {
                Ok(handle) => {
                    let _hook = persist(&self.store, |tx| {
                        Ok(hook::record_success(tx, address, now_millis())?)
                    })?;
                    return Ok(Some(handle.info().clone()));
                }
                Err(err) => {
                    debug!(%address, %err, "hook unreachable");
                    let _hook =
                        persist(&self.store, |tx| Ok(hook::record_failure(tx, address)?))?;
                }
            }
        }

        Ok(None)
    }

    /// Stores a payload for `recipient`, held by this node until it can be
    /// handed over.
    fn defer(
        &self,
        recipient: NodeId,
        kind: DeferredKind,
        content: Vec<u8>,
    ) -> Result<(), NetworkError> {
        ensure_deferrable(self.config.limits.wire(), content.len())?;

        let message = DeferredMessage::new(recipient, now_millis(), kind, content);
        let local = self.node_id();

        let id = persist(&self.store, |tx| Ok(deferred::create(tx, &message, &[local])?))?;

        debug!(%id, %recipient, ?kind, "deferred message");

        Ok(())
    }

    /// Drops held messages older than the configured lifetime.
    fn expire_deferred(&self) -> Result<usize, NetworkError> {
        let ttl =
            i64::try_from(self.config.timeouts.deferred_ttl.as_millis()).unwrap_or(i64::MAX);
        let before = now_millis().saturating_sub(ttl);
        let local = self.node_id();

        persist(&self.store, |tx| {
            let mut expired = 0;

            for recipient in deferred::recipients(tx, local)? {
                expired += deferred::expire(tx, local, recipient, before)?;
            }

            Ok(expired)
        })
    }

    /// Deletes stored messages that nobody holds any more.
    fn purge_unheld_deferred(&self) -> Result<usize, NetworkError> {
        persist(&self.store, |tx| Ok(deferred::purge_orphans(tx)?))
    }
}

/// Wakes connection loops when messages are deferred, so they can offer
/// them to their peer.
#[derive(Debug)]
struct DeferredWaker {
    shared: Weak<Shared>,
}

impl StoreListener for DeferredWaker {
    fn on_commit(&self, changes: &[Change]) {
        let held = changes.iter().any(|change| {
            change.column() == Column::DeferredByRecipient && change.kind() == ChangeKind::Put
        });

        if !held {
            return;
        }

        if let Some(shared) = self.shared.upgrade() {
            shared.wake_all();
        }
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    loop {
        let (stream, address) = tokio::select! {
            () = shared.token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "failed to accept connection");
                    continue;
                }
            },
        };

        debug!(%address, "accepted connection");

        let inbound_shared = Arc::clone(&shared);
        drop(shared.tracker.spawn(async move {
            if let Err(err) = inbound(inbound_shared, stream).await {
                debug!(%address, %err, "inbound connection failed");
            }
        }));
    }

    debug!("accept loop stopped");
}

/// Serves one accepted socket: either a regular connection or one end of a
/// splice claiming its slot.
async fn inbound(shared: Arc<Shared>, stream: TcpStream) -> Result<(), NetworkError> {
    let mut transport = Transport::new(
        stream,
        shared.config.limits.wire(),
        shared.config.timeouts.dialog,
    )?;

    let first = transport.recv_frame().await?;

    if first.code() == MessageCode::SpliceClaim {
        return take_claim(&shared, transport, &first).await;
    }

    let _handle = establish(
        &shared,
        transport,
        Setup {
            direction: Gender::Female,
            expected: None,
            first: Some(first),
            spliced: false,
        },
    )
    .await?;

    Ok(())
}

async fn take_claim(
    shared: &Shared,
    transport: Transport,
    frame: &Frame,
) -> Result<(), NetworkError> {
    let phases = PhaseTracker::new();
    let root = phases.root();
    let phase = root.child(PhaseType::SpliceClaim);

    let SpliceClaim { id, claimant } =
        expect_message!(transport.decode(frame, None)?, SpliceClaim);

    let result = match shared.splices.claim(id, claimant, transport) {
        Ok(Claim::Parked) => {
            debug!(%id, %claimant, "splice end parked");
            phase.complete();
            root.complete();
            return Ok(());
        }
        Ok(Claim::Paired { parked, claimant }) => {
            phase.complete();
            root.run_child(PhaseType::Relay, relay(shared, id, parked, claimant))
                .await
        }
        Err((err, mut transport)) => {
            debug!(%id, %claimant, %err, "splice claim refused");
            let cause = err.to_string();
            let sent = transport.send(SpliceError { cause }).await;
            phase.fail(&NetworkError::splice(err.to_string()));
            sent
        }
    };

    match &result {
        Ok(()) => root.complete(),
        Err(err) => root.fail(err),
    }

    result
}

/// Acknowledges both claims and copies bytes between the two sockets until
/// either side closes.
async fn relay(
    shared: &Shared,
    id: SplicedConnectionId,
    mut parked: Transport,
    mut claimant: Transport,
) -> Result<(), NetworkError> {
    parked.send(SpliceClaimAck { id }).await?;
    claimant.send(SpliceClaimAck { id }).await?;

    let parked = parked.into_parts();
    let claimant = claimant.into_parts();
    let mut left = parked.io;
    let mut right = claimant.io;

    if !parked.read_buf.is_empty() {
        right.write_all(&parked.read_buf).await?;
    }
    if !claimant.read_buf.is_empty() {
        left.write_all(&claimant.read_buf).await?;
    }

    info!(%id, "relaying spliced connection");

    tokio::select! {
        () = shared.token.cancelled() => {}
        copied = copy_bidirectional(&mut left, &mut right) => {
            let (up, down) = copied?;
            debug!(%id, up, down, "splice relay finished");
        }
    }

    Ok(())
}

async fn maintenance(shared: Arc<Shared>) {
    let mut ticks = interval(shared.config.timeouts.maintenance_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shared.token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        let purged = shared.splices.purge_expired();
        if purged > 0 {
            debug!(purged, "purged expired splices");
        }

        match shared.expire_deferred() {
            Ok(0) => {}
            Ok(expired) => info!(expired, "expired deferred messages"),
            Err(err) => warn!(%err, "failed to expire deferred messages"),
        }

        match shared.purge_unheld_deferred() {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "purged unheld deferred messages"),
            Err(err) => warn!(%err, "failed to purge unheld deferred messages"),
        }

        if shared.gender() == Gender::Male && shared.handles().is_empty() {
            match shared.connect_hooks().await {
                Ok(Some(info)) => {
                    info!(peer=%info.peer, address=%info.address, "reconnected through hook");
                }
                Ok(None) => debug!("no hook reachable"),
                Err(err) => warn!(%err, "hook reconnection failed"),
            }
        }
    }
}

/// Behaviour common to Male and Female nodes.
#[derive(Debug)]
pub struct PeerToPeerNode {
    shared: Arc<Shared>,
}

impl PeerToPeerNode {
    async fn start(
        config: NodeConfig,
        store: Store,
        services: Services,
    ) -> Result<Self, NetworkError> {
        registry::validate()?;

        let listener = match (config.network.gender, config.network.listen) {
            (Gender::Female, Some(listen)) => Some(TcpListener::bind(listen).await?),
            (Gender::Female, None) => {
                return Err(NetworkError::Config("a Female node needs a listen address"))
            }
            (Gender::Male, _) => None,
        };
        let listen_address = listener.as_ref().map(TcpListener::local_addr).transpose()?;

        let seeds = config.network.hooks.clone();
        persist(&store, |tx| {
            for address in &seeds {
                let _hook = hook::touch(tx, *address)?;
            }
            Ok(())
        })?;

        let shared = Arc::new(Shared {
            splices: SpliceRegistry::new(config.timeouts.splice_ttl),
            config,
            store: store.clone(),
            services,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            connections: RwLock::default(),
            closed: Notify::new(),
            listen_address,
            next_id: AtomicU64::new(1),
        });

        store.subscribe(Arc::new(DeferredWaker {
            shared: Arc::downgrade(&shared),
        }))?;

        if let Some(listener) = listener {
            drop(shared.tracker.spawn(accept_loop(Arc::clone(&shared), listener)));
        }
        drop(shared.tracker.spawn(maintenance(Arc::clone(&shared))));

        info!(
            node_id=%shared.node_id(),
            gender=%shared.gender(),
            listen=?listen_address,
            "node started"
        );

        Ok(Self { shared })
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.shared.node_id()
    }

    #[must_use]
    pub fn gender(&self) -> Gender {
        self.shared.gender()
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.shared.listen_address
    }

    #[must_use]
    pub fn public_address(&self) -> Option<SocketAddr> {
        self.shared.public_address()
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    pub async fn connect(&self, address: SocketAddr) -> Result<ConnectionInfo, NetworkError> {
        let handle = self.shared.open(address, None).await?;

        Ok(handle.info().clone())
    }

    /// Bootstraps through the hook list, best candidate first. `None` when
    /// no hook could be reached.
    pub async fn connect_hooks(&self) -> Result<Option<ConnectionInfo>, NetworkError> {
        self.shared.connect_hooks().await
    }

    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.shared
            .handles()
            .iter()
            .map(|handle| handle.info().clone())
            .collect()
    }

    /// Live phases of a connection, root first.
    #[must_use]
    pub fn phases(&self, id: ConnectionId) -> Option<Vec<PhaseInfo>> {
        self.shared
            .find(|info| info.id == id)
            .map(|handle| handle.phases())
    }

    /// Splices this node was asked to broker that are not settled yet.
    #[must_use]
    pub fn pending_splices(&self) -> usize {
        self.shared.splices.pending()
    }

    /// Looks a root context up locally, then asks a connected peer.
    pub async fn obtain_root_context(
        &self,
        context: ContextId,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Option<StoredObject>>, NetworkError> {
        let local = object::find_root_context(&mut self.shared.store.begin(), context)?;

        if let Some(object) = local {
            return Ok(Outcome::Done(Some(object)));
        }

        let handle = self.shared.any_connection().ok_or(NetworkError::NoConnection)?;

        handle
            .submit(|reply| Work::RootContext { context, reply }, cancel)
            .await
    }

    /// Sends a signature request to `recipient`. `Done(true)` when the
    /// recipient took it, `Done(false)` when it was deferred because the
    /// recipient is not connected.
    ///
    /// Fails with [`NetworkError::TooLarge`] when the ciphered payload could
    /// not be carried in one frame, directly or deferred.
    pub async fn send_signature_request(
        &self,
        recipient: NodeId,
        payload: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<bool>, NetworkError> {
        let limits = self.shared.config.limits.wire();
        let request = SignatureRequest {
            sender: self.node_id(),
            recipient,
            ciphered: self.shared.services.cipher.cipher(recipient, payload),
        };
        ensure_fits(limits, &request)?;
        ensure_deferrable(limits, request.ciphered.len())?;

        let SignatureRequest { ciphered, .. } = request;

        let Some(handle) = self.shared.connection_to(recipient) else {
            self.shared
                .defer(recipient, DeferredKind::SignatureRequest, ciphered)?;
            return Ok(Outcome::Done(false));
        };

        let work = |reply| Work::Signature {
            recipient,
            ciphered,
            reply,
        };

        Ok(handle.submit(work, cancel).await?.map(|()| true))
    }

    /// Like [`send_signature_request`](Self::send_signature_request), for
    /// person records.
    pub async fn send_persons(
        &self,
        recipient: NodeId,
        persons: Vec<StoredObject>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<bool>, NetworkError> {
        let limits = self.shared.config.limits.wire();
        let message = Persons {
            sender: self.node_id(),
            recipient,
            persons,
        };
        ensure_fits(limits, &message)?;
        ensure_deferrable(limits, persons_content_len(&message.persons))?;

        let Persons { persons, .. } = message;

        let Some(handle) = self.shared.connection_to(recipient) else {
            let content = encode_persons(&persons)?;
            self.shared.defer(recipient, DeferredKind::Persons, content)?;
            return Ok(Outcome::Done(false));
        };

        let work = |reply| Work::Persons {
            recipient,
            persons,
            reply,
        };

        Ok(handle.submit(work, cancel).await?.map(|()| true))
    }

    /// Asks the connected `broker` for a connection to `target` and runs it.
    ///
    /// A broker or target refusing is a [`NetworkError::Splice`] carrying the
    /// cause.
    pub async fn splice(
        &self,
        broker: NodeId,
        target: NodeId,
        address: Option<SocketAddr>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ConnectionInfo>, NetworkError> {
        let handle = self
            .shared
            .connection_to(broker)
            .ok_or(NetworkError::NotConnected(broker))?;

        let Some(broker_address) = handle.info().listen_address else {
            return Err(NetworkError::splice(format!(
                "{broker} does not accept connections"
            )));
        };

        let work = |reply| Work::Splice {
            target,
            address,
            reply,
        };

        let id = match handle.submit(work, cancel).await? {
            Outcome::Done(id) => id,
            Outcome::Rejected(rejection) => return Err(NetworkError::splice(rejection.cause())),
            Outcome::Aborted => return Ok(Outcome::Aborted),
        };

        let shared = &self.shared;
        let pairing = async {
            let mut transport = claim(shared, broker_address, id).await?;
            await_pairing(shared, &mut transport, id).await?;

            establish(
                shared,
                transport,
                Setup {
                    direction: Gender::Male,
                    expected: Some(target),
                    first: None,
                    spliced: true,
                },
            )
            .await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(Outcome::Aborted),
            handle = pairing => Ok(Outcome::Done(handle?.info().clone())),
        }
    }

    pub fn hooks(&self) -> Result<Vec<Hook>, NetworkError> {
        Ok(hook::by_priority(&mut self.shared.store.begin())?)
    }

    /// Forgets every hook. Returns how many were removed.
    pub fn clear_hooks(&self) -> Result<usize, NetworkError> {
        let cleared = persist(&self.shared.store, |tx| Ok(hook::clear(tx)?))?;

        info!(cleared, "cleared hooks");

        Ok(cleared)
    }

    /// Stops the node. A graceful shutdown first agrees on Quit with every
    /// peer and gives the connections a bounded time to close.
    pub async fn shutdown(&self, graceful: bool) {
        if graceful {
            for handle in self.shared.handles() {
                handle.quit();
            }

            let budget = self.shared.config.timeouts.dialog.saturating_mul(2);
            if timeout(budget, self.shared.drained()).await.is_err() {
                warn!(?budget, "connections still open after graceful shutdown");
            }
        }

        self.shared.token.cancel();
        let _closed = self.shared.tracker.close();
        self.shared.tracker.wait().await;

        info!(node_id=%self.shared.node_id(), graceful, "node stopped");
    }
}

impl Drop for PeerToPeerNode {
    fn drop(&mut self) {
        self.shared.token.cancel();
    }
}

/// A node that only initiates connections.
#[derive(Debug)]
pub struct MaleNode(PeerToPeerNode);

impl MaleNode {
    pub async fn start(
        config: NodeConfig,
        store: Store,
        services: Services,
    ) -> Result<Self, NetworkError> {
        if config.network.gender != Gender::Male {
            return Err(NetworkError::Config("a Male node needs a Male configuration"));
        }

        PeerToPeerNode::start(config, store, services).await.map(Self)
    }
}

impl Deref for MaleNode {
    type Target = PeerToPeerNode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A publicly reachable node accepting connections.
#[derive(Debug)]
pub struct FemaleNode(PeerToPeerNode);

impl FemaleNode {
    pub async fn start(
        config: NodeConfig,
        store: Store,
        services: Services,
    ) -> Result<Self, NetworkError> {
        if config.network.gender != Gender::Female {
            return Err(NetworkError::Config("a Female node needs a Female configuration"));
        }

        PeerToPeerNode::start(config, store, services).await.map(Self)
    }

    /// Announces this node to the network through the hook at `hook_address`.
    /// `Done(false)` when the hook could not verify our public address.
    pub async fn network_join(
        &self,
        hook_address: SocketAddr,
        cancel: &CancellationToken,
    ) -> Result<Outcome<bool>, NetworkError> {
        let shared = &self.0.shared;
        let address = shared
            .public_address()
            .ok_or(NetworkError::Config("joining needs a public address"))?;

        let handle = match shared.connection_at(hook_address) {
            Some(handle) => handle,
            None => shared.open(hook_address, None).await?,
        };

        let outcome = handle
            .submit(|reply| Work::Join { address, reply }, cancel)
            .await?;

        Ok(match outcome {
            Outcome::Done(()) => {
                let _hook = persist(&shared.store, |tx| {
                    Ok(hook::record_success(tx, hook_address, now_millis())?)
                })?;
                info!(%hook_address, %address, "joined the network");
                Outcome::Done(true)
            }
            Outcome::Rejected(rejection) => {
                info!(%hook_address, %rejection, "join rejected");
                Outcome::Done(false)
            }
            Outcome::Aborted => Outcome::Aborted,
        })
    }
}

impl Deref for FemaleNode {
    type Target = PeerToPeerNode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
