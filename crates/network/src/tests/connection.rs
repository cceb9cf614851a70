use super::*;

fn peer(address: &str, listen_address: Option<&str>) -> PeerInfo {
    PeerInfo {
        node_id: NodeId::random(),
        gender: Gender::Male,
        listen_address: listen_address.map(addr),
        version: ProtocolVersion::LATEST,
        direction: Gender::Male,
        address: addr(address),
        resolver: true,
    }
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

#[test]
fn test_direct_connection_reaches_its_socket_address() {
    let info = ConnectionInfo::new(ConnectionId::new(1), &peer("10.0.0.1:7640", None), false);

    assert!(info.reaches(addr("10.0.0.1:7640")));
    assert!(!info.reaches(addr("10.0.0.2:7640")));
}

#[test]
fn test_connection_reaches_peer_listen_address() {
    let peer = peer("10.0.0.1:51000", Some("10.0.0.1:7640"));
    let info = ConnectionInfo::new(ConnectionId::new(2), &peer, false);

    assert!(info.reaches(addr("10.0.0.1:7640")));
}

#[test]
fn test_spliced_connection_does_not_reach_broker() {
    let broker = "10.0.0.9:7640";
    let info = ConnectionInfo::new(ConnectionId::new(3), &peer(broker, None), true);

    assert!(!info.reaches(addr(broker)));
}
