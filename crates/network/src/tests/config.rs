use claims::assert_ok;
use proofnet_primitives::version::ProtocolVersion;

use super::*;

#[test]
fn test_local_female_listens_on_loopback() {
    let config = NodeConfig::local(NodeId::random(), Gender::Female);

    assert_eq!(config.network.listen, Some(SocketAddr::from(([127, 0, 0, 1], 0))));

    let config = NodeConfig::local(NodeId::random(), Gender::Male);

    assert_eq!(config.network.listen, None);
}

#[test]
fn test_timeouts_serialize_as_millis() {
    let timeouts = TimeoutConfig::default();
    let json = assert_ok!(serde_json::to_value(timeouts));

    assert_eq!(json["dialog_ms"], 10_000);
    assert_eq!(json["connect_ms"], 5_000);
    assert_eq!(json["deferred_ttl_ms"], 7 * 24 * 60 * 60 * 1000);

    let back: TimeoutConfig = assert_ok!(serde_json::from_value(json));
    assert_eq!(back.idle_interval, Duration::from_secs(30));
}

#[test]
fn test_network_defaults() {
    let network: NetworkConfig = assert_ok!(serde_json::from_str(r#"{"gender":"male"}"#));

    assert_eq!(network.gender, Gender::Male);
    assert!(network.hooks.is_empty());
    assert!(network.versions.contains(ProtocolVersion::V1));
    assert!(network.versions.contains(ProtocolVersion::V2));
}

#[test]
fn test_limits_feed_the_wire_codec() {
    let limits = LimitsConfig::default();
    let wire = limits.wire();

    assert_eq!(wire, Limits::default());
    assert_eq!(limits.request_queue, 32);
}
