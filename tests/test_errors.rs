//! Error classification and collector-facing messages.

use pkmn_collection::{CollectionError, ErrorKind};

#[test]
fn kinds_follow_variants() {
    let cases = [
        (CollectionError::BadInput("x".into()), ErrorKind::BadInput),
        (CollectionError::NotFound("x".into()), ErrorKind::NotFound),
        (CollectionError::Conflict("x".into()), ErrorKind::Conflict),
        (CollectionError::Transient("x".into()), ErrorKind::Transient),
        (
            CollectionError::InvalidUpstreamData("x".into()),
            ErrorKind::InvalidUpstreamData,
        ),
        (CollectionError::Cancelled, ErrorKind::Cancelled),
        (CollectionError::OperationFailed("x".into()), ErrorKind::Internal),
    ];
    for (err, kind) in cases {
        assert_eq!(err.kind(), kind, "{err}");
    }
}

#[test]
fn infrastructure_errors_are_internal() {
    let io = CollectionError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    assert_eq!(io.kind(), ErrorKind::Internal);

    let json = CollectionError::from(serde_json::from_str::<u32>("nope").unwrap_err());
    assert_eq!(json.kind(), ErrorKind::Internal);
    assert!(!json.is_retryable());
}

#[test]
fn only_transient_is_retryable() {
    assert!(CollectionError::Transient("503".into()).is_retryable());
    assert!(!CollectionError::NotFound("x".into()).is_retryable());
    assert!(!CollectionError::Cancelled.is_retryable());
}

#[test]
fn user_messages_hide_details() {
    let conflict = CollectionError::Conflict("card swsh3-136 is already in the collection".into());
    assert_eq!(conflict.user_message(), "This card is already in your collection.");

    let internal = CollectionError::OperationFailed("Task join error: panicked".into());
    assert!(!internal.user_message().contains("panicked"));
}
