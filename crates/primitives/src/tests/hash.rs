use super::*;

#[test]
fn test_base58_round_trip() {
    let hash = Hash::new(b"proofnet");
    let parsed: Hash = hash.to_string().parse().unwrap();

    assert_eq!(parsed, hash);
}

#[test]
fn test_rejects_short_input() {
    let short = bs58::encode([1_u8; 8]).into_string();

    assert!(matches!(short.parse::<Hash>(), Err(HashError::InvalidLength)));
}

#[test]
fn test_parts_are_length_delimited() {
    let joined = Hash::of_parts(&[b"ab", b"c"]);
    let shifted = Hash::of_parts(&[b"a", b"bc"]);

    assert_ne!(joined, shifted);
    assert_eq!(joined, Hash::of_parts(&[b"ab", b"c"]));
}

#[test]
fn test_serde_as_string() {
    let hash = Hash::new(b"json");
    let json = serde_json::to_string(&hash).unwrap();

    assert_eq!(json, format!("\"{hash}\""));
    assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);
}
