mod common;

use claims::{assert_matches, assert_some};
use common::{eventually, female, male, within, Recorder};
use proofnet_network::phase::PhaseType;
use proofnet_network::Outcome;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::version::ProtocolVersion;
use proofnet_store::object::{self, ObjectKind, StoredObject};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_handshake_registers_both_ends() -> eyre::Result<()> {
    let hub = female(Recorder::new()).await?;
    let leaf = male(Recorder::new()).await?;
    let address = assert_some!(hub.local_address());

    let info = within(leaf.connect(address)).await?;

    assert_eq!(info.peer, hub.node_id());
    assert_eq!(info.gender, Gender::Female);
    assert_eq!(info.version, ProtocolVersion::LATEST.get());
    assert_eq!(info.listen_address, Some(address));
    assert!(info.outbound);

    eventually(|| {
        hub.connections()
            .iter()
            .any(|info| info.peer == leaf.node_id() && !info.outbound)
    })
    .await;

    eventually(|| {
        leaf.phases(info.id).is_some_and(|phases| {
            phases[0].kind == PhaseType::Root
                && phases.iter().any(|phase| phase.kind == PhaseType::Conjugal)
        })
    })
    .await;

    leaf.shutdown(true).await;
    hub.shutdown(true).await;

    Ok(())
}

#[tokio::test]
async fn test_male_learns_hooks_from_female() -> eyre::Result<()> {
    let hub = female(Recorder::new()).await?;
    let leaf = male(Recorder::new()).await?;
    let address = assert_some!(hub.public_address());

    let _info = within(leaf.connect(address)).await?;

    eventually(|| {
        leaf.hooks()
            .is_ok_and(|hooks| hooks.iter().any(|hook| hook.address() == address))
    })
    .await;

    assert_eq!(leaf.clear_hooks()?, 1);
    assert!(leaf.hooks()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_graceful_shutdown_closes_peer_side() -> eyre::Result<()> {
    let hub = female(Recorder::new()).await?;
    let leaf = male(Recorder::new()).await?;

    let _info = within(leaf.connect(assert_some!(hub.local_address()))).await?;
    eventually(|| hub.connections().len() == 1).await;

    within(leaf.shutdown(true)).await;

    assert!(leaf.connections().is_empty());
    eventually(|| hub.connections().is_empty()).await;

    Ok(())
}

#[tokio::test]
async fn test_persons_reach_connected_recipient() -> eyre::Result<()> {
    let received = Recorder::new();
    let hub = female(received.clone()).await?;
    let leaf = male(Recorder::new()).await?;
    let cancel = CancellationToken::new();

    let _info = within(leaf.connect(assert_some!(hub.local_address()))).await?;

    let person = StoredObject::new(ObjectKind::Person, b"alice".to_vec());
    let outcome = within(leaf.send_persons(hub.node_id(), vec![person.clone()], &cancel)).await?;

    assert_eq!(outcome, Outcome::Done(true));
    assert_eq!(received.persons(), [(Some(leaf.node_id()), vec![person.clone()])]);

    let stored = object::get(&mut hub.store().begin(), person.digest())?;
    assert_eq!(stored, Some(person));

    Ok(())
}

#[tokio::test]
async fn test_rejected_signature_request_reports_cause() -> eyre::Result<()> {
    let received = Recorder::new();
    let hub = female(received.clone()).await?;
    let leaf = male(Recorder::new()).await?;
    let cancel = CancellationToken::new();

    let _info = within(leaf.connect(assert_some!(hub.local_address()))).await?;

    let outcome = within(leaf.send_signature_request(hub.node_id(), Vec::new(), &cancel)).await?;
    assert_matches!(outcome, Outcome::Rejected(rejection) if rejection.cause().contains("empty"));

    let outcome =
        within(leaf.send_signature_request(hub.node_id(), b"sign me".to_vec(), &cancel)).await?;
    assert_eq!(outcome, Outcome::Done(true));
    assert_eq!(
        received.signatures(),
        [(Some(leaf.node_id()), b"sign me".to_vec())]
    );

    Ok(())
}
