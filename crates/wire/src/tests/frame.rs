use claims::{assert_matches, assert_none, assert_ok, assert_some};
use futures_util::StreamExt;
use proofnet_primitives::gender::Gender;
use proofnet_primitives::identity::NodeId;
use proofnet_primitives::splice::SplicedConnectionId;
use proofnet_primitives::version::VersionSet;
use tokio_test::io::Builder;
use tokio_util::codec::FramedRead;

use super::*;
use crate::message::{Hello, LoopDialogType, LoopProposal, SignatureRequest, SpliceClaim, Verdict};

fn hello() -> Message {
    Hello {
        node_id: NodeId::random(),
        gender: Gender::Male,
        listen_address: None,
        versions: VersionSet::ALL,
    }
    .into()
}

#[test]
fn test_frame_waits_for_complete_message() {
    let mut codec = FrameCodec::default();
    let mut encoded = BytesMut::new();
    assert_ok!(codec.encode(&Verdict::reject("busy").into(), &mut encoded));

    let mut src = BytesMut::new();
    for byte in &encoded[..encoded.len() - 1] {
        src.put_u8(*byte);
        assert_none!(assert_ok!(codec.decode(&mut src)));
    }

    src.put_u8(encoded[encoded.len() - 1]);
    let frame = assert_some!(assert_ok!(codec.decode(&mut src)));

    assert!(src.is_empty());
    assert_eq!(frame.code(), MessageCode::Verdict);
    assert_eq!(frame.len(), encoded.len());
    assert_eq!(
        assert_ok!(frame.decode(None, Limits::default())),
        Message::from(Verdict::reject("busy"))
    );
}

#[test]
fn test_unknown_code_is_a_protocol_error() {
    let mut codec = FrameCodec::default();
    let mut src = BytesMut::from(&[0xff, 0xfe, 0, 0][..]);

    assert_matches!(codec.decode(&mut src), Err(WireError::UnknownCode(0xfffe)));
}

#[test]
fn test_oversized_frame_is_rejected() {
    let mut codec = FrameCodec::new(Limits {
        max_frame_len: 16,
        max_array_len: 16,
    });
    let mut src = BytesMut::new();
    src.put_u16(MessageCode::SpliceError.to_wire());
    src.put_u32(1_000);

    codec.negotiated(ProtocolVersion::V2);

    assert_matches!(
        codec.decode(&mut src),
        Err(WireError::LengthExceeded { len: 1_000, max: 16 })
    );
}

#[test]
fn test_oversized_message_is_not_encoded() {
    let mut codec = FrameCodec::new(Limits {
        max_frame_len: 64,
        max_array_len: 16,
    });
    codec.negotiated(ProtocolVersion::V2);

    let request = SignatureRequest {
        sender: NodeId::random(),
        recipient: NodeId::random(),
        ciphered: vec![7; 64],
    };
    let mut dst = BytesMut::new();
    assert_ok!(codec.encode(&Verdict::accept().into(), &mut dst));
    let before = dst.clone();

    assert_matches!(
        codec.encode(&request.into(), &mut dst),
        Err(WireError::LengthExceeded { len: 102, max: 64 })
    );
    assert_eq!(dst, before);
}

#[test]
fn test_frame_len_matches_encoding() {
    let request = SignatureRequest {
        sender: NodeId::random(),
        recipient: NodeId::random(),
        ciphered: vec![1; 10],
    };
    let len = assert_ok!(frame_len(&request, ProtocolVersion::V2));

    let mut dst = BytesMut::new();
    assert_ok!(encode(&request.into(), ProtocolVersion::V2, &mut dst));

    assert_eq!(len, dst.len());
    assert_eq!(len, 2 + 16 + 16 + 4 + 10);
}

#[test]
fn test_pre_negotiation_uses_lowest_version() {
    let mut codec = FrameCodec::default();
    let claim: Message = SpliceClaim {
        id: SplicedConnectionId::mint(),
        claimant: NodeId::random(),
    }
    .into();

    let mut buf = BytesMut::new();
    assert_ok!(codec.encode(&claim, &mut buf));

    let frame = assert_some!(assert_ok!(codec.decode(&mut buf)));
    assert_eq!(frame.version(), ProtocolVersion::V2);

    let mut buf = BytesMut::new();
    assert_ok!(codec.encode(&hello(), &mut buf));
    let frame = assert_some!(assert_ok!(codec.decode(&mut buf)));
    assert_eq!(frame.version(), ProtocolVersion::V1);
}

#[test]
fn test_negotiated_version_gates_kinds() {
    let mut codec = FrameCodec::default();
    codec.negotiated(ProtocolVersion::V1);

    let claim: Message = SpliceClaim {
        id: SplicedConnectionId::mint(),
        claimant: NodeId::random(),
    }
    .into();

    let mut buf = BytesMut::new();
    assert_matches!(
        codec.encode(&claim, &mut buf),
        Err(WireError::UnsupportedVersion { .. })
    );
    assert!(buf.is_empty());
}

#[tokio::test]
async fn test_frames_from_stream() {
    let mut codec = FrameCodec::default();
    let first = hello();
    let second: Message = LoopProposal {
        dialog: LoopDialogType::Idle,
    }
    .into();

    let mut buffer = BytesMut::new();
    assert_ok!(codec.encode(&first, &mut buffer));
    assert_ok!(codec.encode(&second, &mut buffer));

    let (head, tail) = buffer.split_at(5);
    let mut stream = Builder::new().read(head).read(tail).build();
    let mut framed = FramedRead::new(&mut stream, FrameCodec::default());

    let frame = assert_ok!(assert_some!(framed.next().await));
    assert_eq!(assert_ok!(frame.decode(None, Limits::default())), first);

    let frame = assert_ok!(assert_some!(framed.next().await));
    assert_eq!(assert_ok!(frame.decode(None, Limits::default())), second);

    assert_none!(framed.next().await);
}
