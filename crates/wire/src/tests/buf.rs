use claims::{assert_err, assert_matches, assert_ok};

use super::*;

#[test]
fn test_reader_reports_incomplete_input() {
    let mut r = WireReader::new(&[0, 1, 2], Limits::default());

    assert_matches!(r.u32(), Err(WireError::Incomplete));
    assert_eq!(r.position(), 0);
    assert_eq!(assert_ok!(r.u16()), 1);
    assert_eq!(r.remaining(), 1);
}

#[test]
fn test_oversized_byte_string_is_rejected() {
    let limits = Limits {
        max_frame_len: 8,
        max_array_len: 8,
    };
    let mut r = WireReader::new(&[0, 0, 0, 9], limits);

    assert_matches!(
        r.bytes(),
        Err(WireError::LengthExceeded { len: 9, max: 8 })
    );
}

#[test]
fn test_oversized_count_is_rejected() {
    let limits = Limits {
        max_frame_len: 1024,
        max_array_len: 2,
    };
    let mut r = WireReader::new(&[0xff, 0xff, 0xff, 0xff], limits);

    let err = assert_err!(r.count());
    assert!(err.is_resource());
}

#[test]
fn test_presence_flag_must_be_boolean() {
    let mut r = WireReader::new(&[2], Limits::default());

    assert_matches!(r.option(WireReader::u8), Err(WireError::InvalidData(_)));
}

#[test]
fn test_socket_addresses_round_trip() {
    let v4: SocketAddr = "192.0.2.7:4321".parse().unwrap();
    let v6: SocketAddr = "[2001:db8::1]:80".parse().unwrap();

    let mut buf = BytesMut::new();
    let mut w = WireWriter::new(&mut buf);
    w.socket_addr(v4);
    w.socket_addr(v6);

    assert_eq!(buf.len(), (1 + 4 + 2) + (1 + 16 + 2));

    let mut r = WireReader::new(&buf, Limits::default());
    assert_eq!(assert_ok!(r.socket_addr()), v4);
    assert_eq!(assert_ok!(r.socket_addr()), v6);
    assert!(r.is_empty());
}

#[test]
fn test_uuid_is_two_big_endian_words() {
    let id = NodeId::from_parts(1, 2);

    let mut buf = BytesMut::new();
    WireWriter::new(&mut buf).node_id(id);

    assert_eq!(&buf[..], &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2]);
}
