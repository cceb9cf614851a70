use std::net::SocketAddr;

use bytes::BytesMut;
use claims::{assert_matches, assert_ok};
use proofnet_primitives::context::ContextId;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::hash::Hash;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::VersionSet;
use proofnet_store::deferred::{DeferredKind, DeferredMessage};
use proofnet_store::object::{ObjectKind, StoredObject};
use proofnet_store::Store;

use super::*;
use crate::buf::{Limits, WireReader};
use crate::frame;
use crate::registry;

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn samples() -> Vec<Message> {
    let (alice, bob) = (NodeId::random(), NodeId::random());
    let splice = SplicedConnectionId::mint();

    vec![
        Hello {
            node_id: alice,
            gender: Gender::Female,
            listen_address: Some(addr("10.0.0.1:7000")),
            versions: VersionSet::ALL,
        }
        .into(),
        Hello {
            node_id: bob,
            gender: Gender::Male,
            listen_address: None,
            versions: VersionSet::of(&[ProtocolVersion::V1]),
        }
        .into(),
        SpliceClaim {
            id: splice,
            claimant: alice,
        }
        .into(),
        SpliceClaimAck { id: splice }.into(),
        LoopProposal {
            dialog: LoopDialogType::RootContext,
        }
        .into(),
        Quit.into(),
        HooksRequest.into(),
        Hooks {
            hooks: vec![
                HookAddress {
                    address: addr("[2001:db8::2]:7000"),
                    last_success_millis: 1_700_000_000_000,
                },
                HookAddress {
                    address: addr("192.0.2.1:7001"),
                    last_success_millis: 0,
                },
            ],
        }
        .into(),
        JoinRequest {
            listen_address: addr("198.51.100.4:7000"),
        }
        .into(),
        Verdict::accept().into(),
        Verdict::reject("address not reachable").into(),
        RootContextRequest {
            context: ContextId::random(),
        }
        .into(),
        RootContextResponse {
            context: ContextId::random(),
            object: Some(StoredObject::new(ObjectKind::RootContext, b"root".to_vec())),
        }
        .into(),
        RootContextResponse {
            context: ContextId::random(),
            object: None,
        }
        .into(),
        SignatureRequest {
            sender: alice,
            recipient: bob,
            ciphered: vec![1, 2, 3, 4],
        }
        .into(),
        Persons {
            sender: bob,
            recipient: alice,
            persons: vec![
                StoredObject::new(ObjectKind::Person, b"ada".to_vec()),
                StoredObject::new(ObjectKind::Person, b"kurt".to_vec()),
            ],
        }
        .into(),
        DeferredMessages {
            messages: vec![DeferredMessage::new(
                bob,
                -3,
                DeferredKind::SignatureRequest,
                b"later".to_vec(),
            )],
        }
        .into(),
        DeferredAck {
            ids: vec![Hash::new(b"one"), Hash::new(b"two")],
        }
        .into(),
        SpliceRequest {
            target: bob,
            address: Some(addr("203.0.113.9:7000")),
        }
        .into(),
        SpliceIntroduction {
            id: splice,
            broker: addr("203.0.113.1:7000"),
            requester: alice,
        }
        .into(),
        SpliceAccepted { id: splice }.into(),
        SpliceError {
            cause: "target unreachable".to_owned(),
        }
        .into(),
    ]
}

#[test]
fn test_samples_cover_every_code() {
    let samples = samples();

    for entry in registry::registrations() {
        assert!(
            samples.iter().any(|message| message.code() == entry.code()),
            "no sample for {:?}",
            entry.code()
        );
    }
}

#[test]
fn test_round_trip_every_kind_and_version() {
    let store = Store::in_memory();

    for message in samples() {
        let entry = assert_ok!(registry::lookup(message.code().to_wire()));

        for version in entry.versions().iter() {
            let mut buf = BytesMut::new();
            assert_ok!(frame::encode(&message, version, &mut buf));

            let body = &buf[2..];

            let mut skipper = WireReader::new(body, Limits::default());
            assert_ok!(entry.skip(&mut skipper, version));

            let mut tx = store.begin();
            let mut decoder = WireReader::new(body, Limits::default());
            let decoded = assert_ok!(entry.decode(&mut decoder, version, Some(&mut tx)));

            assert_eq!(skipper.position(), decoder.position(), "{}", message.name());
            assert!(decoder.is_empty(), "{} left bytes", message.name());

            match (&message, &decoded) {
                (Message::Hooks(sent), Message::Hooks(got)) if version == ProtocolVersion::V1 => {
                    let sent: Vec<_> = sent.hooks.iter().map(|hook| hook.address).collect();
                    let got: Vec<_> = got.hooks.iter().map(|hook| hook.address).collect();
                    assert_eq!(sent, got);
                }
                _ => assert_eq!(decoded, message, "version {version}"),
            }
        }
    }
}

#[test]
fn test_hooks_timestamps_only_in_v2() {
    let hooks = Hooks {
        hooks: vec![HookAddress {
            address: addr("192.0.2.1:1"),
            last_success_millis: 42,
        }],
    };

    let mut v1 = BytesMut::new();
    let mut v2 = BytesMut::new();
    assert_ok!(frame::encode(&hooks.clone().into(), ProtocolVersion::V1, &mut v1));
    assert_ok!(frame::encode(&hooks.into(), ProtocolVersion::V2, &mut v2));

    assert_eq!(v2.len() - v1.len(), 8);
}

#[test]
fn test_persisted_decode_requires_transaction() {
    let message: Message = Persons {
        sender: NodeId::random(),
        recipient: NodeId::random(),
        persons: vec![],
    }
    .into();

    let mut buf = BytesMut::new();
    assert_ok!(frame::encode(&message, ProtocolVersion::V2, &mut buf));

    let entry = assert_ok!(registry::lookup(message.code().to_wire()));
    let mut r = WireReader::new(&buf[2..], Limits::default());

    assert_matches!(
        entry.decode(&mut r, ProtocolVersion::V2, None),
        Err(WireError::MissingTransaction(MessageCode::Persons))
    );
}

#[test]
fn test_deferred_batch_length_is_predictable() {
    let messages: Vec<_> = [0_usize, 5, 300]
        .into_iter()
        .map(|len| {
            DeferredMessage::new(
                NodeId::random(),
                1,
                DeferredKind::Persons,
                vec![0; len],
            )
        })
        .collect();
    let expected = DeferredMessages::HEADER_LEN
        + messages
            .iter()
            .map(|message| DeferredMessages::entry_len(message.content().len()))
            .sum::<usize>();

    let mut buf = BytesMut::new();
    assert_ok!(frame::encode(
        &DeferredMessages { messages }.into(),
        ProtocolVersion::V2,
        &mut buf
    ));

    assert_eq!(buf.len(), expected);
}

#[test]
fn test_root_context_response_is_stored_on_decode() {
    let store = Store::in_memory();
    let context = ContextId::random();
    let message: Message = RootContextResponse {
        context,
        object: Some(StoredObject::new(ObjectKind::RootContext, b"axioms".to_vec())),
    }
    .into();

    let mut buf = BytesMut::new();
    assert_ok!(frame::encode(&message, ProtocolVersion::V1, &mut buf));

    let entry = assert_ok!(registry::lookup(message.code().to_wire()));
    let mut tx = store.begin();
    let _decoded = assert_ok!(entry.decode(
        &mut WireReader::new(&buf[2..], Limits::default()),
        ProtocolVersion::V1,
        Some(&mut tx)
    ));
    let _changes = assert_ok!(tx.commit());

    let mut tx = store.begin();
    let found = assert_ok!(proofnet_store::object::find_root_context(&mut tx, context));
    assert_eq!(found.map(|object| object.data().to_vec()), Some(b"axioms".to_vec()));
}

#[test]
fn test_splice_dialog_types_need_v2() {
    let message: Message = LoopProposal {
        dialog: LoopDialogType::SpliceRequest,
    }
    .into();

    let mut buf = BytesMut::new();
    assert_ok!(frame::encode(&message, ProtocolVersion::V1, &mut buf));

    let entry = assert_ok!(registry::lookup(message.code().to_wire()));
    let mut r = WireReader::new(&buf[2..], Limits::default());

    assert_matches!(
        entry.decode(&mut r, ProtocolVersion::V1, None),
        Err(WireError::InvalidData(_))
    );
}
