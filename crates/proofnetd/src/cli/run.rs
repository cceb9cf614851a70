use core::time::Duration;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use camino::Utf8Path;
use clap::Parser;
use eyre::{bail, Result as EyreResult};
use proofnet_config::ConfigFile;
use proofnet_network::{
    ConnectionId, ConnectionInfo, FemaleNode, MaleNode, Outcome, PeerToPeerNode, Services,
};
use proofnet_primitives::gender::Gender;
use proofnet_store::Store;
use tokio::signal::ctrl_c;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RootArgs;

/// Run a node
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Announce this Female node through the hook at this address
    #[arg(long, value_name = "ADDR")]
    pub join: Option<SocketAddr>,

    /// How often the connection table is checked for changes
    #[arg(long, value_name = "MS", default_value_t = 1_000)]
    pub watch_interval_ms: u64,
}

enum Running {
    Male(MaleNode),
    Female(FemaleNode),
}

impl Running {
    fn node(&self) -> &PeerToPeerNode {
        match self {
            Self::Male(node) => &**node,
            Self::Female(node) => &**node,
        }
    }
}

impl RunCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let path = root_args.home()?;

        if !ConfigFile::exists(&path) {
            bail!("Node is not initialized in {path:?}");
        }

        let config = ConfigFile::load(&path)?;
        let store = Store::in_memory();
        let services = Services::with_store(store.clone());
        let node_config = config.to_node_config();

        let running = match config.network.gender {
            Gender::Male => Running::Male(MaleNode::start(node_config, store, services).await?),
            Gender::Female => {
                Running::Female(FemaleNode::start(node_config, store, services).await?)
            }
        };

        let node = running.node();

        info!(
            node_id=%node.node_id(),
            gender=?node.gender(),
            local_address=?node.local_address(),
            public_address=?node.public_address(),
            "node running"
        );

        if let Some(hook_address) = self.join {
            let Running::Female(female) = &running else {
                bail!("only Female nodes can join the network");
            };

            match female.network_join(hook_address, &CancellationToken::new()).await? {
                Outcome::Done(true) => {}
                Outcome::Done(false) | Outcome::Rejected(_) => {
                    warn!(%hook_address, "hook could not verify our public address");
                }
                Outcome::Aborted => warn!(%hook_address, "join aborted"),
            }
        }

        watch(node, Duration::from_millis(self.watch_interval_ms)).await?;

        remember_hooks(node, config, &path)?;

        node.shutdown(true).await;

        Ok(())
    }
}

/// Logs connections as they open and close until Ctrl-C.
async fn watch(node: &PeerToPeerNode, period: Duration) -> EyreResult<()> {
    let mut known = BTreeMap::<ConnectionId, ConnectionInfo>::new();
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            result = ctrl_c() => {
                result?;
                info!("received Ctrl-C, shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let current: BTreeMap<_, _> = node
            .connections()
            .into_iter()
            .map(|info| (info.id, info))
            .collect();

        for (id, info) in &current {
            if !known.contains_key(id) {
                info!(
                    connection=%id,
                    peer=%info.peer,
                    gender=?info.gender,
                    address=%info.address,
                    version=info.version,
                    spliced=info.spliced,
                    "connection opened"
                );
            }
        }

        for (id, info) in &known {
            if !current.contains_key(id) {
                info!(connection=%id, peer=%info.peer, "connection closed");
            }
        }

        if current.keys().ne(known.keys()) {
            info!(
                connections=%serde_json::to_string(&current.values().collect::<Vec<_>>())?,
                "connection table"
            );
        }

        known = current;
    }
}

/// Writes the hooks learned during this run back to the configuration so
/// the next run can bootstrap from them.
fn remember_hooks(
    node: &PeerToPeerNode,
    mut config: ConfigFile,
    path: &Utf8Path,
) -> EyreResult<()> {
    let own = node.public_address();
    let hooks: Vec<_> = node
        .hooks()?
        .into_iter()
        .filter(|hook| hook.failed_attempts() == 0)
        .map(|hook| hook.address())
        .filter(|address| Some(*address) != own)
        .collect();

    if hooks.is_empty() {
        return Ok(());
    }

    config.network.hooks = hooks;

    if config.save_if_changed(path)? {
        info!(count = config.network.hooks.len(), "saved learned hooks");
    }

    Ok(())
}
