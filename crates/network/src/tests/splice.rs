use claims::{assert_err, assert_matches, assert_ok};

use super::*;

fn registry() -> SpliceRegistry<&'static str> {
    SpliceRegistry::new(Duration::from_secs(30))
}

#[test]
fn test_second_end_pairs_with_parked_one() {
    let registry = registry();
    let requester = NodeId::random();
    let target = NodeId::random();
    let id = registry.mint(requester, target);

    assert_matches!(assert_ok!(registry.claim(id, target, "target")), Claim::Parked);
    assert_eq!(registry.pending(), 1);

    let Claim::Paired { parked, claimant } = assert_ok!(registry.claim(id, requester, "requester"))
    else {
        panic!("expected a pair");
    };

    assert_eq!(parked, "target");
    assert_eq!(claimant, "requester");
    assert_eq!(registry.pending(), 0);
}

#[test]
fn test_second_claim_by_same_end_fails_cleanly() {
    let registry = registry();
    let requester = NodeId::random();
    let target = NodeId::random();
    let id = registry.mint(requester, target);

    assert_ok!(registry.claim(id, requester, "first"));

    let (err, stream) = assert_err!(registry.claim(id, requester, "second"));
    assert_eq!(err, ClaimError::AlreadyClaimed { id, claimant: requester });
    assert_eq!(stream, "second");

    let Claim::Paired { parked, .. } = assert_ok!(registry.claim(id, target, "target")) else {
        panic!("expected a pair");
    };
    assert_eq!(parked, "first");
}

#[test]
fn test_paired_id_cannot_be_claimed_again() {
    let registry = registry();
    let requester = NodeId::random();
    let target = NodeId::random();
    let id = registry.mint(requester, target);

    assert_ok!(registry.claim(id, requester, "a"));
    assert_ok!(registry.claim(id, target, "b"));

    let (err, _) = assert_err!(registry.claim(id, target, "c"));
    assert_eq!(err, ClaimError::Unknown(id));
}

#[test]
fn test_outsider_cannot_claim() {
    let registry = registry();
    let id = registry.mint(NodeId::random(), NodeId::random());
    let outsider = NodeId::random();

    let (err, _) = assert_err!(registry.claim(id, outsider, "x"));
    assert_eq!(err, ClaimError::NotParticipant { id, claimant: outsider });
    assert_eq!(registry.pending(), 1);
}

#[test]
fn test_discard_releases_slot() {
    let registry = registry();
    let id = registry.mint(NodeId::random(), NodeId::random());

    assert!(registry.discard(id));
    assert!(!registry.discard(id));
    assert_eq!(registry.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_slots_are_purged() {
    let registry = registry();
    let requester = NodeId::random();
    let id = registry.mint(requester, NodeId::random());
    let _fresh = registry.mint(NodeId::random(), NodeId::random());

    tokio::time::advance(Duration::from_secs(20)).await;
    let late = registry.mint(NodeId::random(), NodeId::random());
    tokio::time::advance(Duration::from_secs(11)).await;

    let (err, _) = assert_err!(registry.claim(id, requester, "late"));
    assert_eq!(err, ClaimError::Unknown(id));

    assert_eq!(registry.purge_expired(), 1);
    assert_eq!(registry.pending(), 1);
    assert!(registry.discard(late));
}
