use super::*;

#[test]
fn test_contains() {
    let set = VersionSet::of(&[ProtocolVersion::V1]);

    assert!(set.contains(ProtocolVersion::V1));
    assert!(!set.contains(ProtocolVersion::V2));
    assert!(!set.contains(ProtocolVersion::new(0)));
    assert!(!set.contains(ProtocolVersion::new(40)));
}

#[test]
fn test_negotiate_picks_highest_common() {
    let ours = VersionSet::ALL;
    let theirs = VersionSet::of(&[ProtocolVersion::V1, ProtocolVersion::new(3)]);

    assert_eq!(ours.negotiate(theirs), Some(ProtocolVersion::V1));
    assert_eq!(ours.negotiate(VersionSet::ALL), Some(ProtocolVersion::V2));
    assert_eq!(theirs.negotiate(VersionSet::SINCE_V2), None);
}

#[test]
fn test_highest_and_lowest() {
    let set = VersionSet::of(&[ProtocolVersion::new(2), ProtocolVersion::new(5)]);

    assert_eq!(set.highest(), Some(ProtocolVersion::new(5)));
    assert_eq!(set.lowest(), Some(ProtocolVersion::new(2)));
    assert_eq!(VersionSet::EMPTY.highest(), None);
}

#[test]
fn test_iter_is_ascending() {
    let versions: Vec<_> = VersionSet::ALL.iter().collect();

    assert_eq!(versions, vec![ProtocolVersion::V1, ProtocolVersion::V2]);
}
