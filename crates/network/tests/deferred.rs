mod common;

use claims::{assert_err, assert_matches, assert_ok, assert_some};
use common::{config, eventually, female, male, male_with, within, Recorder};
use proofnet_network::{NetworkError, Outcome};
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_store::deferred::{self, DeferredKind, DeferredMessage};
use proofnet_store::object::{ObjectKind, StoredObject};
use proofnet_store::Store;
use tokio_util::sync::CancellationToken;

fn stored_messages(store: &Store) -> usize {
    store
        .begin()
        .scan::<DeferredMessage>(&[])
        .map_or(usize::MAX, |rows| rows.len())
}

#[tokio::test]
async fn test_female_relays_deferred_signature_request() -> eyre::Result<()> {
    let relay = female(Recorder::new()).await?;
    let sender = male(Recorder::new()).await?;
    let received = Recorder::new();
    let recipient = male(received.clone()).await?;
    let address = assert_some!(relay.local_address());
    let cancel = CancellationToken::new();

    let _info = within(sender.connect(address)).await?;

    let outcome = within(sender.send_signature_request(
        recipient.node_id(),
        b"later".to_vec(),
        &cancel,
    ))
    .await?;
    assert_eq!(outcome, Outcome::Done(false));

    // The sender hands the message to the relay and lets go of it.
    eventually(|| {
        deferred::held_for(&mut relay.store().begin(), relay.node_id(), recipient.node_id())
            .is_ok_and(|held| held.len() == 1)
    })
    .await;
    eventually(|| {
        deferred::held_by(&mut sender.store().begin(), sender.node_id())
            .is_ok_and(|held| held.is_empty())
    })
    .await;

    let _info = within(recipient.connect(address)).await?;

    eventually(|| received.signatures().len() == 1).await;
    assert_eq!(received.signatures(), [(None, b"later".to_vec())]);

    eventually(|| {
        deferred::held_by(&mut relay.store().begin(), relay.node_id())
            .is_ok_and(|held| held.is_empty())
    })
    .await;

    // Nothing is left behind without a holder on either end.
    eventually(|| stored_messages(relay.store()) == 0).await;
    eventually(|| stored_messages(recipient.store()) == 0).await;

    Ok(())
}

#[tokio::test]
async fn test_deferred_persons_delivered_on_connect() -> eyre::Result<()> {
    let received = Recorder::new();
    let hub = female(received.clone()).await?;
    let leaf = male(Recorder::new()).await?;
    let cancel = CancellationToken::new();
    let person = StoredObject::new(ObjectKind::Person, b"bob".to_vec());

    let outcome = within(leaf.send_persons(hub.node_id(), vec![person.clone()], &cancel)).await?;
    assert_eq!(outcome, Outcome::Done(false));

    let _info = within(leaf.connect(assert_some!(hub.local_address()))).await?;

    eventually(|| received.persons().len() == 1).await;
    assert_eq!(received.persons(), [(None, vec![person])]);

    eventually(|| {
        deferred::held_by(&mut leaf.store().begin(), leaf.node_id())
            .is_ok_and(|held| held.is_empty())
    })
    .await;

    Ok(())
}

#[tokio::test]
async fn test_oversized_payload_is_refused_and_connection_survives() -> eyre::Result<()> {
    let received = Recorder::new();
    let hub = female(received.clone()).await?;
    let mut config = config(Gender::Male);
    config.limits.max_frame_len = 1024;
    let leaf = male_with(config, Store::in_memory()).await?;
    let cancel = CancellationToken::new();

    let _info = within(leaf.connect(assert_some!(hub.local_address()))).await?;

    let err = assert_err!(
        within(leaf.send_signature_request(hub.node_id(), vec![1; 4096], &cancel)).await
    );
    assert_matches!(err, NetworkError::TooLarge { max: 1024, .. });
    assert!(!err.is_fatal());

    let person = StoredObject::new(ObjectKind::Person, vec![2; 4096]);
    let err = assert_err!(within(leaf.send_persons(NodeId::random(), vec![person], &cancel)).await);
    assert_matches!(err, NetworkError::TooLarge { .. });
    assert!(assert_ok!(deferred::held_by(&mut leaf.store().begin(), leaf.node_id())).is_empty());

    let outcome =
        within(leaf.send_signature_request(hub.node_id(), b"small".to_vec(), &cancel)).await?;
    assert_eq!(outcome, Outcome::Done(true));
    assert_eq!(received.signatures(), [(Some(leaf.node_id()), b"small".to_vec())]);
    assert_eq!(leaf.connections().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_message_too_large_to_hand_over_stays_behind() -> eyre::Result<()> {
    let mut config = config(Gender::Male);
    config.limits.max_frame_len = 1024;
    let local = config.node_id;
    let absent = NodeId::random();
    let stuck = DeferredMessage::new(absent, 1, DeferredKind::SignatureRequest, vec![3; 2048]);
    let fits = DeferredMessage::new(absent, 2, DeferredKind::SignatureRequest, b"fits".to_vec());

    let store = Store::in_memory();
    assert_ok!(store.retry(|tx| {
        let _id = deferred::create(tx, &stuck, &[local])?;
        deferred::create(tx, &fits, &[local])
    }));

    let sender = male_with(config, store).await?;
    let relay = female(Recorder::new()).await?;

    let _info = within(sender.connect(assert_some!(relay.local_address()))).await?;

    eventually(|| {
        deferred::held_for(&mut relay.store().begin(), relay.node_id(), absent)
            .is_ok_and(|held| held.len() == 1 && held[0].message() == fits.digest())
    })
    .await;
    eventually(|| {
        deferred::held_by(&mut sender.store().begin(), local)
            .is_ok_and(|held| held.len() == 1 && held[0].message() == stuck.digest())
    })
    .await;

    assert_eq!(sender.connections().len(), 1);

    Ok(())
}
