use claims::{assert_matches, assert_ok};

use super::*;

#[test]
fn test_registry_is_complete_and_unique() {
    assert_ok!(validate());
    assert_eq!(registrations().len(), MessageCode::iter().count());
}

#[test]
fn test_unknown_code_is_rejected() {
    assert_matches!(lookup(0xbeef), Err(WireError::UnknownCode(0xbeef)));
}

#[test]
fn test_unsupported_version_fails_at_construction() {
    assert_matches!(
        codec(MessageCode::SpliceRequest, ProtocolVersion::V1),
        Err(WireError::UnsupportedVersion {
            code: MessageCode::SpliceRequest,
            ..
        })
    );
    assert_ok!(codec(MessageCode::SpliceRequest, ProtocolVersion::V2));
    assert_matches!(
        codec(MessageCode::Hello, ProtocolVersion::new(9)),
        Err(WireError::UnsupportedVersion { .. })
    );
}

#[test]
fn test_persisted_flags() {
    let persisted: Vec<_> = registrations()
        .iter()
        .filter(|entry| entry.is_persisted())
        .map(Registration::code)
        .collect();

    assert_eq!(
        persisted,
        [
            MessageCode::RootContextResponse,
            MessageCode::Persons,
            MessageCode::DeferredMessages,
        ]
    );
}

#[test]
fn test_hello_is_understood_by_every_version() {
    let entry = assert_ok!(lookup(MessageCode::Hello.to_wire()));

    assert_eq!(entry.versions(), VersionSet::ALL);
    assert_eq!(entry.initial_version(), Some(ProtocolVersion::V1));
}

#[test]
fn test_decode_fn_debug_names_its_flavour() {
    let hello = assert_ok!(lookup(MessageCode::Hello.to_wire()));
    let persons = assert_ok!(lookup(MessageCode::Persons.to_wire()));

    assert_eq!(format!("{:?}", hello.decode), "Plain");
    assert_eq!(format!("{:?}", persons.decode), "Persisted");
}
