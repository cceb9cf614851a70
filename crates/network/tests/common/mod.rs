#![allow(dead_code, reason = "Each test binary uses a different subset")]

use core::future::Future;
use core::time::Duration;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use proofnet_network::{FemaleNode, InboundHandler, MaleNode, NodeConfig, Rejection, Services};
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_store::object::StoredObject;
use proofnet_store::Store;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

pub fn config(gender: Gender) -> NodeConfig {
    let mut config = NodeConfig::local(NodeId::random(), gender);

    config.timeouts.dialog = Duration::from_secs(2);
    config.timeouts.connect = Duration::from_secs(1);
    config.timeouts.idle_interval = Duration::from_millis(250);
    config.timeouts.maintenance_interval = Duration::from_secs(60);

    config
}

pub async fn female(inbound: Arc<Recorder>) -> eyre::Result<FemaleNode> {
    female_with(config(Gender::Female), |services| services.inbound(inbound)).await
}

pub async fn female_with(
    config: NodeConfig,
    services: impl FnOnce(Services) -> Services,
) -> eyre::Result<FemaleNode> {
    let store = Store::in_memory();
    let services = services(Services::with_store(store.clone()));

    Ok(FemaleNode::start(config, store, services).await?)
}

pub async fn male(inbound: Arc<Recorder>) -> eyre::Result<MaleNode> {
    let store = Store::in_memory();
    let services = Services::with_store(store.clone()).inbound(inbound);

    Ok(MaleNode::start(config(Gender::Male), store, services).await?)
}

pub async fn male_with(config: NodeConfig, store: Store) -> eyre::Result<MaleNode> {
    let services = Services::with_store(store.clone());

    Ok(MaleNode::start(config, store, services).await?)
}

/// An address nothing listens on.
pub async fn dead_address() -> eyre::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);

    Ok(address)
}

/// Polls `check` until it holds, failing the test after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(10), async {
        while !check() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    timeout(Duration::from_secs(15), future)
        .await
        .expect("operation did not finish in time")
}

/// Inbound handler remembering what it was handed.
#[derive(Debug, Default)]
pub struct Recorder {
    signatures: Mutex<Vec<(Option<NodeId>, Vec<u8>)>>,
    persons: Mutex<Vec<(Option<NodeId>, Vec<StoredObject>)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    pub fn signatures(&self) -> Vec<(Option<NodeId>, Vec<u8>)> {
        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn persons(&self) -> Vec<(Option<NodeId>, Vec<StoredObject>)> {
        self.persons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InboundHandler for Recorder {
    async fn signature_request(
        &self,
        sender: Option<NodeId>,
        payload: Vec<u8>,
    ) -> Result<(), Rejection> {
        if payload.is_empty() {
            return Err(Rejection::new("empty signature request"));
        }

        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sender, payload));

        Ok(())
    }

    async fn persons(
        &self,
        sender: Option<NodeId>,
        persons: Vec<StoredObject>,
    ) -> Result<(), Rejection> {
        self.persons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sender, persons));

        Ok(())
    }
}

