use super::*;

#[test]
fn test_parts_round_trip() {
    let id = NodeId::random();
    let (most, least) = id.to_parts();

    assert_eq!(NodeId::from_parts(most, least), id);
}

#[test]
fn test_parse_display() {
    let id: NodeId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();

    assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    assert!("not-a-node".parse::<NodeId>().is_err());
}

#[test]
fn test_ordering_follows_bytes() {
    let low = NodeId::from_parts(1, u64::MAX);
    let high = NodeId::from_parts(2, 0);

    assert!(low < high);
    assert!(low.as_bytes() < high.as_bytes());
}

#[test]
fn test_borsh_is_raw_bytes() {
    let id = NodeId::from_parts(0x0102_0304_0506_0708, 0x090a_0b0c_0d0e_0f10);
    let encoded = borsh::to_vec(&id).unwrap();

    assert_eq!(encoded.as_slice(), id.as_bytes());
    assert_eq!(borsh::from_slice::<NodeId>(&encoded).unwrap(), id);
}
