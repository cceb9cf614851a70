//! One established connection and the loop that drives it.

use core::fmt;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use proofnet_primitives::context::ContextId;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::object::StoredObject;
use proofnet_wire::message::{LoopDialogType, LoopProposal, Quit};
use proofnet_wire::Frame;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dialog::deferred::{pending_for, HandOverDeferred, TakeOverDeferred};
use crate::dialog::delivery::{
    ReceivePersons, ReceiveSignatureRequest, SendPersons, SendSignatureRequest,
};
use crate::dialog::handshake::Handshake;
use crate::dialog::hooks::{FetchHooks, ServeHooks};
use crate::dialog::join::{Join, ServeJoin};
use crate::dialog::root_context::{FetchRootContext, ServeRootContext};
use crate::dialog::splice::{AcceptIntroduction, BrokerSplice, IntroduceSplice, RequestSplice};
use crate::dialog::{Dialog, DialogContext};
use crate::node::Shared;
use crate::outcome::Outcome;
use crate::phase::{Phase, PhaseInfo, PhaseTracker, PhaseType};
use crate::selector::agree;
use crate::transport::{expect_message, Transport};
use crate::NetworkError;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the handshake established about the peer.
#[derive(Clone, Debug)]
pub struct PeerInfo {
    pub node_id: NodeId,
    pub gender: Gender,
    /// Where the peer accepts connections, if it does.
    pub listen_address: Option<SocketAddr>,
    pub version: ProtocolVersion,
    /// Male when this side opened the connection.
    pub direction: Gender,
    /// Socket address of the other end of this connection.
    pub address: SocketAddr,
    /// Whether this side settles differing loop proposals.
    pub resolver: bool,
}

/// Public view of a live connection.
#[derive(Clone, Debug, Serialize)]
#[non_exhaustive]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: NodeId,
    pub gender: Gender,
    pub address: SocketAddr,
    pub listen_address: Option<SocketAddr>,
    pub version: u16,
    pub outbound: bool,
    pub spliced: bool,
}

impl ConnectionInfo {
    fn new(id: ConnectionId, peer: &PeerInfo, spliced: bool) -> Self {
        Self {
            id,
            peer: peer.node_id,
            gender: peer.gender,
            address: peer.address,
            listen_address: peer.listen_address,
            version: peer.version.get(),
            outbound: peer.direction == Gender::Male,
            spliced,
        }
    }

    /// Whether this connection leads to the node listening at `address`.
    /// A spliced connection's socket ends at the broker, not at the peer.
    pub(crate) fn reaches(&self, address: SocketAddr) -> bool {
        self.listen_address == Some(address) || (!self.spliced && self.address == address)
    }
}

pub(crate) type Reply<T> = oneshot::Sender<Result<Outcome<T>, NetworkError>>;

/// Local work handed to a connection loop by the node.
#[derive(Debug)]
pub(crate) enum Work {
    RootContext {
        context: ContextId,
        reply: Reply<Option<StoredObject>>,
    },
    Signature {
        recipient: NodeId,
        ciphered: Vec<u8>,
        reply: Reply<()>,
    },
    Persons {
        recipient: NodeId,
        persons: Vec<StoredObject>,
        reply: Reply<()>,
    },
    Join {
        address: SocketAddr,
        reply: Reply<()>,
    },
    Splice {
        target: NodeId,
        address: Option<SocketAddr>,
        reply: Reply<SplicedConnectionId>,
    },
    Introduce {
        id: SplicedConnectionId,
        broker: SocketAddr,
        requester: NodeId,
        reply: Reply<()>,
    },
    Quit,
}

impl Work {
    const fn dialog(&self) -> LoopDialogType {
        match self {
            Self::RootContext { .. } => LoopDialogType::RootContext,
            Self::Signature { .. } => LoopDialogType::Signature,
            Self::Persons { .. } => LoopDialogType::Persons,
            Self::Join { .. } => LoopDialogType::Join,
            Self::Splice { .. } => LoopDialogType::SpliceRequest,
            Self::Introduce { .. } => LoopDialogType::SpliceIntroduction,
            Self::Quit => LoopDialogType::Quit,
        }
    }

    /// Answers the caller without running anything.
    fn refuse(self, err: impl Fn() -> NetworkError) {
        match self {
            Self::RootContext { reply, .. } => drop(reply.send(Err(err()))),
            Self::Signature { reply, .. }
            | Self::Persons { reply, .. }
            | Self::Join { reply, .. }
            | Self::Introduce { reply, .. } => drop(reply.send(Err(err()))),
            Self::Splice { reply, .. } => drop(reply.send(Err(err()))),
            Self::Quit => {}
        }
    }
}

#[derive(Debug)]
pub(crate) struct Request {
    pub cancel: CancellationToken,
    pub work: Work,
}

/// The node's end of a running connection.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionHandle {
    info: ConnectionInfo,
    requests: mpsc::Sender<Request>,
    wake: Arc<Notify>,
    phases: PhaseTracker,
}

impl ConnectionHandle {
    pub const fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub const fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn phases(&self) -> Vec<PhaseInfo> {
        self.phases.snapshot()
    }

    /// Makes an idle loop look for local work again.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Asks the loop to close the connection gracefully.
    pub fn quit(&self) {
        let request = Request {
            cancel: CancellationToken::new(),
            work: Work::Quit,
        };

        if self.requests.try_send(request).is_err() {
            debug!(id=%self.info.id, "connection busy or gone, quit not queued");
        }
    }

    /// Queues work on the loop and waits for its outcome, giving up with
    /// [`Outcome::Aborted`] as soon as `cancel` fires.
    pub async fn submit<T>(
        &self,
        work: impl FnOnce(Reply<T>) -> Work,
        cancel: &CancellationToken,
    ) -> Result<Outcome<T>, NetworkError> {
        let id = self.info.id;
        let (reply, answer) = oneshot::channel();
        let request = Request {
            cancel: cancel.child_token(),
            work: work(reply),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Outcome::Aborted),
            sent = self.requests.send(request) => {
                sent.map_err(|_| NetworkError::ConnectionGone(id))?;
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(Outcome::Aborted),
            answer = answer => answer.map_err(|_| NetworkError::ConnectionGone(id))?,
        }
    }
}

/// How a connection came to be, for the handshake and bookkeeping.
#[derive(Debug)]
pub(crate) struct Setup {
    pub direction: Gender,
    pub expected: Option<NodeId>,
    /// The peer's first frame when the accept path already read it.
    pub first: Option<Frame>,
    pub spliced: bool,
}

/// Runs the handshake on `transport`, registers the connection and spawns
/// its loop. Returns once the connection is usable.
pub(crate) async fn establish(
    shared: &Arc<Shared>,
    mut transport: Transport,
    setup: Setup,
) -> Result<ConnectionHandle, NetworkError> {
    let phases = PhaseTracker::new();
    let root = phases.root();

    let handshake = Handshake {
        shared,
        direction: setup.direction,
        expected: setup.expected,
        first: setup.first,
    };

    let peer = match root
        .run_child(PhaseType::Handshake, handshake.run(&mut transport))
        .await
    {
        Ok(peer) => peer,
        Err(err) => {
            root.fail(&err);
            return Err(err);
        }
    };

    let (requests, receiver) = mpsc::channel(shared.config.limits.request_queue);
    let id = shared.next_connection_id();
    let handle = ConnectionHandle {
        info: ConnectionInfo::new(id, &peer, setup.spliced),
        requests,
        wake: Arc::new(Notify::new()),
        phases,
    };

    shared.register(handle.clone());

    info!(
        %id,
        peer=%peer.node_id,
        gender=%peer.gender,
        address=%peer.address,
        version=%peer.version,
        spliced=setup.spliced,
        "connection established"
    );

    let conjugal = Conjugal {
        shared: Arc::clone(shared),
        transport,
        peer,
        id,
        requests: receiver,
        wake: Arc::clone(&handle.wake),
        pending: VecDeque::new(),
        hooks_due: false,
    };

    let tracker = shared.tracker.clone();
    let shared = Arc::clone(shared);
    drop(tracker.spawn(async move {
        run(shared, conjugal, root).await;
    }));

    Ok(handle)
}

async fn run(shared: Arc<Shared>, mut conjugal: Conjugal, root: Phase) {
    let id = conjugal.id;
    let peer = conjugal.peer.node_id;
    let phase = root.child(PhaseType::Conjugal);

    let result = tokio::select! {
        () = shared.token.cancelled() => Ok(()),
        result = conjugal.run(&phase) => result,
    };

    shared.unregister(id);

    match result {
        Ok(()) => {
            phase.complete();
            root.complete();
            info!(%id, %peer, "connection closed");
        }
        Err(err) => {
            if err.is_fatal() {
                warn!(%id, %peer, %err, "connection failed");
            } else {
                debug!(%id, %peer, %err, "connection ended");
            }
            phase.fail(&err);
            root.fail(&err);
        }
    }
}

/// The repeating propose/agree/dialog loop of an established connection.
#[derive(Debug)]
struct Conjugal {
    shared: Arc<Shared>,
    transport: Transport,
    peer: PeerInfo,
    id: ConnectionId,
    requests: mpsc::Receiver<Request>,
    wake: Arc<Notify>,
    pending: VecDeque<Request>,
    hooks_due: bool,
}

impl Conjugal {
    async fn run(&mut self, phase: &Phase) -> Result<(), NetworkError> {
        self.hooks_due = self.peer.gender == Gender::Female;

        loop {
            let mine = self.own_work()?;

            if mine == LoopDialogType::Idle && !self.wait_for_activity().await? {
                continue;
            }

            let mine = self.own_work()?;

            self.transport.send(LoopProposal { dialog: mine }).await?;
            let theirs = self.transport.recv_proposal().await?;

            if !theirs.is_supported(self.peer.version) {
                return Err(NetworkError::protocol(format!(
                    "peer proposed {theirs:?} at version {}",
                    self.peer.version
                )));
            }

            let agreement = agree(mine, theirs, self.peer.resolver);

            if agreement.dialog == LoopDialogType::Quit {
                return self.quit(agreement.active).await;
            }

            let kind = PhaseType::Dialog(agreement.dialog);
            let child = phase.child(kind);

            let result = if agreement.active {
                self.active(agreement.dialog).await
            } else {
                self.passive(agreement.dialog).await
            };

            match result {
                Ok(()) => child.complete(),
                Err(err) => {
                    child.fail(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Waits while there is nothing to propose. Returns `false` when local
    /// work may have appeared and `true` when it is time to exchange
    /// proposals anyway.
    async fn wait_for_activity(&mut self) -> Result<bool, NetworkError> {
        let idle = self.shared.config.timeouts.idle_interval;

        tokio::select! {
            request = self.requests.recv() => match request {
                Some(request) => {
                    self.pending.push_back(request);
                    Ok(false)
                }
                None => Err(NetworkError::ConnectionGone(self.id)),
            },
            () = self.wake.notified() => Ok(false),
            readable = self.transport.readable() => readable.map(|()| true),
            () = sleep(idle) => Ok(true),
        }
    }

    /// What this side wants to do next.
    fn own_work(&mut self) -> Result<LoopDialogType, NetworkError> {
        while let Ok(request) = self.requests.try_recv() {
            self.pending.push_back(request);
        }

        if let Some(position) = self
            .pending
            .iter()
            .position(|request| matches!(request.work, Work::Quit))
        {
            if let Some(quit) = self.pending.remove(position) {
                self.pending.push_front(quit);
            }
        }

        while let Some(request) = self.pending.front() {
            let dialog = request.work.dialog();

            if request.cancel.is_cancelled() {
                drop(self.pending.pop_front());
                continue;
            }

            if !dialog.is_supported(self.peer.version) {
                if let Some(request) = self.pending.pop_front() {
                    request.work.refuse(|| NetworkError::Unsupported(dialog_name(dialog)));
                }
                continue;
            }

            return Ok(dialog);
        }

        if self.hooks_due {
            return Ok(LoopDialogType::Hooks);
        }

        let pending = pending_for(&mut self.shared.store.begin(), &self.shared, &self.peer)?;
        if !pending.is_empty() {
            return Ok(LoopDialogType::Deferred);
        }

        Ok(LoopDialogType::Idle)
    }

    async fn active(&mut self, dialog: LoopDialogType) -> Result<(), NetworkError> {
        let shared = Arc::clone(&self.shared);
        let peer = self.peer.clone();

        match dialog {
            LoopDialogType::Idle | LoopDialogType::Quit => Ok(()),
            LoopDialogType::Hooks => {
                self.hooks_due = false;
                let mut cx = DialogContext::new(
                    &shared,
                    &mut self.transport,
                    &peer,
                    CancellationToken::new(),
                );
                FetchHooks.dialogate(&mut cx).await.map(drop)
            }
            LoopDialogType::Deferred => {
                let mut cx = DialogContext::new(
                    &shared,
                    &mut self.transport,
                    &peer,
                    CancellationToken::new(),
                );
                HandOverDeferred.dialogate(&mut cx).await.map(drop)
            }
            _ => {
                let Some(Request { cancel, work }) = self.pending.pop_front() else {
                    return Err(NetworkError::protocol(format!(
                        "agreed on {dialog:?} with nothing to run"
                    )));
                };
                let mut cx = DialogContext::new(&shared, &mut self.transport, &peer, cancel);

                match work {
                    Work::RootContext { context, reply } => {
                        answer(&mut cx, FetchRootContext { context }, reply).await
                    }
                    Work::Signature {
                        recipient,
                        ciphered,
                        reply,
                    } => {
                        answer(&mut cx, SendSignatureRequest { recipient, ciphered }, reply).await
                    }
                    Work::Persons {
                        recipient,
                        persons,
                        reply,
                    } => answer(&mut cx, SendPersons { recipient, persons }, reply).await,
                    Work::Join { address, reply } => answer(&mut cx, Join { address }, reply).await,
                    Work::Splice {
                        target,
                        address,
                        reply,
                    } => answer(&mut cx, RequestSplice { target, address }, reply).await,
                    Work::Introduce {
                        id,
                        broker,
                        requester,
                        reply,
                    } => {
                        let dialog = IntroduceSplice {
                            id,
                            broker,
                            requester,
                        };
                        answer(&mut cx, dialog, reply).await
                    }
                    Work::Quit => Ok(()),
                }
            }
        }
    }

    async fn passive(&mut self, dialog: LoopDialogType) -> Result<(), NetworkError> {
        let shared = Arc::clone(&self.shared);
        let peer = self.peer.clone();
        let mut cx = DialogContext::new(
            &shared,
            &mut self.transport,
            &peer,
            CancellationToken::new(),
        );

        let outcome = match dialog {
            LoopDialogType::Idle | LoopDialogType::Quit => return Ok(()),
            LoopDialogType::Hooks => ServeHooks.dialogate(&mut cx).await?,
            LoopDialogType::Join => ServeJoin.dialogate(&mut cx).await?,
            LoopDialogType::RootContext => ServeRootContext.dialogate(&mut cx).await?,
            LoopDialogType::Signature => ReceiveSignatureRequest.dialogate(&mut cx).await?,
            LoopDialogType::Persons => ReceivePersons.dialogate(&mut cx).await?,
            LoopDialogType::Deferred => TakeOverDeferred.dialogate(&mut cx).await?,
            LoopDialogType::SpliceRequest => BrokerSplice.dialogate(&mut cx).await?,
            LoopDialogType::SpliceIntroduction => AcceptIntroduction.dialogate(&mut cx).await?,
        };

        if let Outcome::Rejected(rejection) = outcome {
            debug!(id=%self.id, ?dialog, %rejection, "passive dialog rejected");
        }

        Ok(())
    }

    async fn quit(&mut self, active: bool) -> Result<(), NetworkError> {
        if active {
            self.transport.send(Quit).await?;
        } else {
            let frame = self.transport.recv_frame().await?;
            let _quit = expect_message!(self.transport.decode(&frame, None)?, Quit);
        }

        debug!(id=%self.id, peer=%self.peer.node_id, active, "quit agreed");

        Ok(())
    }
}

/// Runs an active dialog for a node request and hands the outcome back.
///
/// Errors that leave the stream unusable end the connection; the caller
/// then sees the connection gone. Anything else, timeouts included, goes
/// back to the caller.
async fn answer<D: Dialog>(
    cx: &mut DialogContext<'_>,
    dialog: D,
    reply: Reply<D::Output>,
) -> Result<(), NetworkError> {
    match dialog.dialogate(cx).await {
        Ok(outcome) => {
            drop(reply.send(Ok(outcome)));
            Ok(())
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            drop(reply.send(Err(err)));
            Ok(())
        }
    }
}

const fn dialog_name(dialog: LoopDialogType) -> &'static str {
    match dialog {
        LoopDialogType::Idle => "idle",
        LoopDialogType::Quit => "quit",
        LoopDialogType::Hooks => "hooks",
        LoopDialogType::Join => "join",
        LoopDialogType::RootContext => "root context",
        LoopDialogType::Signature => "signature request",
        LoopDialogType::Persons => "persons",
        LoopDialogType::Deferred => "deferred messages",
        LoopDialogType::SpliceRequest => "splice request",
        LoopDialogType::SpliceIntroduction => "splice introduction",
    }
}

#[cfg(test)]
#[path = "tests/connection.rs"]
mod tests;
