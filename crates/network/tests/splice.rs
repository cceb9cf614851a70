mod common;

use claims::{assert_err, assert_matches, assert_some};
use common::{dead_address, eventually, female, male, within, Recorder};
use proofnet_network::{NetworkError, Outcome};
use proofnet_primitives::identity::NodeId;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_splice_connects_two_males_through_broker() -> eyre::Result<()> {
    let broker = female(Recorder::new()).await?;
    let requester = male(Recorder::new()).await?;
    let received = Recorder::new();
    let target = male(received.clone()).await?;
    let address = assert_some!(broker.local_address());
    let cancel = CancellationToken::new();

    let _info = within(requester.connect(address)).await?;
    let _info = within(target.connect(address)).await?;
    eventually(|| broker.connections().len() == 2).await;

    let splice = requester.splice(broker.node_id(), target.node_id(), None, &cancel);
    let outcome = within(splice).await?;
    let Outcome::Done(spliced) = outcome else {
        panic!("splice did not complete: {outcome:?}");
    };

    assert_eq!(spliced.peer, target.node_id());
    assert!(spliced.spliced);
    assert_eq!(broker.pending_splices(), 0);

    eventually(|| {
        target
            .connections()
            .iter()
            .any(|info| info.spliced && info.peer == requester.node_id())
    })
    .await;

    let outcome = within(requester.send_signature_request(
        target.node_id(),
        b"over the splice".to_vec(),
        &cancel,
    ))
    .await?;

    assert_eq!(outcome, Outcome::Done(true));
    assert_eq!(
        received.signatures(),
        [(Some(requester.node_id()), b"over the splice".to_vec())]
    );

    Ok(())
}

#[tokio::test]
async fn test_splice_to_unreachable_target_reports_cause() -> eyre::Result<()> {
    let broker = female(Recorder::new()).await?;
    let requester = male(Recorder::new()).await?;
    let cancel = CancellationToken::new();

    let _info = within(requester.connect(assert_some!(broker.local_address()))).await?;

    let unreachable = dead_address().await?;
    let err = assert_err!(
        within(requester.splice(
            broker.node_id(),
            NodeId::random(),
            Some(unreachable),
            &cancel,
        ))
        .await
    );

    assert_matches!(err, NetworkError::Splice { ref cause } if !cause.is_empty());
    assert_eq!(broker.pending_splices(), 0);
    assert_eq!(requester.connections().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_splice_to_unknown_target_without_address_fails() -> eyre::Result<()> {
    let broker = female(Recorder::new()).await?;
    let requester = male(Recorder::new()).await?;
    let cancel = CancellationToken::new();

    let _info = within(requester.connect(assert_some!(broker.local_address()))).await?;

    let err = assert_err!(
        within(requester.splice(broker.node_id(), NodeId::random(), None, &cancel)).await
    );

    assert_matches!(err, NetworkError::Splice { .. });
    assert_eq!(broker.pending_splices(), 0);

    Ok(())
}

#[tokio::test]
async fn test_splice_needs_connected_broker() -> eyre::Result<()> {
    let requester = male(Recorder::new()).await?;
    let broker = NodeId::random();

    let err = assert_err!(
        requester
            .splice(broker, NodeId::random(), None, &CancellationToken::new())
            .await
    );

    assert_matches!(err, NetworkError::NotConnected(node) if node == broker);

    Ok(())
}
