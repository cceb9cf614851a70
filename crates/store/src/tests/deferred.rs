use claims::{assert_none, assert_ok, assert_some};

use super::*;
use crate::Store;

fn message(recipient: NodeId, date: i64, content: &[u8]) -> DeferredMessage {
    DeferredMessage::new(recipient, date, DeferredKind::Persons, content.to_vec())
}

#[test]
fn test_message_without_holders_is_deleted_with_last_holding() {
    let store = Store::in_memory();
    let holder = NodeId::random();
    let deferred = message(NodeId::random(), 42, b"persons");
    let id = deferred.digest();

    assert_ok!(store.retry(|tx| create(tx, &deferred, &[])));

    let mut tx = store.begin();
    assert_some!(assert_ok!(tx.get::<DeferredMessage>(&id)));
    assert!(assert_ok!(holders(&mut tx, id)).is_empty());
    drop(tx);

    assert_ok!(store.retry(|tx| hold(tx, holder, &deferred)));

    let deleted = assert_ok!(store.retry(|tx| release(tx, holder, id)));
    assert!(deleted);

    let mut tx = store.begin();
    assert_none!(assert_ok!(tx.get::<DeferredMessage>(&id)));
    assert_none!(assert_ok!(tx.get::<NodeDeferredMessage>(&(holder, id))));
    assert!(assert_ok!(held_for(&mut tx, holder, deferred.recipient())).is_empty());
}

#[test]
fn test_message_survives_while_another_node_holds_it() {
    let store = Store::in_memory();
    let (first, second) = (NodeId::random(), NodeId::random());
    let deferred = message(NodeId::random(), 1, b"signature");
    let id = deferred.digest();

    assert_ok!(store.retry(|tx| create(tx, &deferred, &[first, second])));

    assert!(!assert_ok!(store.retry(|tx| release(tx, first, id))));

    let mut tx = store.begin();
    assert_some!(assert_ok!(tx.get::<DeferredMessage>(&id)));
    assert_eq!(assert_ok!(holders(&mut tx, id)), [second]);
}

#[test]
fn test_delete_if_no_nodes_spares_held_messages() {
    let store = Store::in_memory();
    let holder = NodeId::random();
    let held = message(NodeId::random(), 1, b"held");
    let orphan = message(NodeId::random(), 1, b"orphan");

    assert_ok!(store.retry(|tx| {
        let _id = create(tx, &held, &[holder])?;
        create(tx, &orphan, &[])
    }));

    let mut tx = store.begin();
    assert!(!assert_ok!(delete_if_no_nodes(&mut tx, held.digest())));
    assert!(assert_ok!(delete_if_no_nodes(&mut tx, orphan.digest())));
    assert!(!assert_ok!(delete_if_no_nodes(&mut tx, orphan.digest())));
    let _changes = assert_ok!(tx.commit());
}

#[test]
fn test_purge_orphans_keeps_held_messages() {
    let store = Store::in_memory();
    let holder = NodeId::random();
    let held = message(NodeId::random(), 1, b"held");
    let orphans = [
        message(NodeId::random(), 2, b"dropped on decode"),
        message(NodeId::random(), 3, b"never held"),
    ];

    assert_ok!(store.retry(|tx| {
        let _id = create(tx, &held, &[holder])?;
        for orphan in &orphans {
            let _id = create(tx, orphan, &[])?;
        }
        Ok(())
    }));

    assert_eq!(assert_ok!(store.retry(purge_orphans)), 2);
    assert_eq!(assert_ok!(store.retry(purge_orphans)), 0);

    let mut tx = store.begin();
    assert_some!(assert_ok!(tx.get::<DeferredMessage>(&held.digest())));
    for orphan in &orphans {
        assert_none!(assert_ok!(tx.get::<DeferredMessage>(&orphan.digest())));
    }
}

#[test]
fn test_held_for_returns_oldest_first() {
    let store = Store::in_memory();
    let holder = NodeId::random();
    let recipient = NodeId::random();
    let messages = [
        message(recipient, 30, b"c"),
        message(recipient, -5, b"a"),
        message(recipient, 10, b"b"),
        message(NodeId::random(), 0, b"other"),
    ];

    assert_ok!(store.retry(|tx| {
        for deferred in &messages {
            let _id = create(tx, deferred, &[holder])?;
        }
        Ok(())
    }));

    let mut tx = store.begin();
    let dates: Vec<_> = assert_ok!(held_for(&mut tx, holder, recipient))
        .iter()
        .map(NodeDeferredMessage::date)
        .collect();

    assert_eq!(dates, [-5, 10, 30]);
    assert_eq!(assert_ok!(recipients(&mut tx, holder)).len(), 2);
    assert_eq!(assert_ok!(held_by(&mut tx, holder)).len(), 4);
}

#[test]
fn test_expire_releases_only_older_holdings() {
    let store = Store::in_memory();
    let holder = NodeId::random();
    let recipient = NodeId::random();
    let old = message(recipient, 100, b"old");
    let new = message(recipient, 200, b"new");

    assert_ok!(store.retry(|tx| {
        let _id = create(tx, &old, &[holder])?;
        create(tx, &new, &[holder])
    }));

    assert_eq!(assert_ok!(store.retry(|tx| expire(tx, holder, recipient, 150))), 1);

    let mut tx = store.begin();
    assert_none!(assert_ok!(tx.get::<DeferredMessage>(&old.digest())));
    assert_some!(assert_ok!(tx.get::<DeferredMessage>(&new.digest())));
}
