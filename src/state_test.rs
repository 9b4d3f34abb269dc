use super::*;

fn alice() -> Identity {
    Identity { id: "u1".into(), email: "alice@example.com".into() }
}

#[test]
fn default_is_unauthenticated_and_unrestored() {
    let snapshot = AuthSnapshot::default();
    assert!(!snapshot.is_authenticated());
    assert!(!snapshot.restored);
    assert_eq!(snapshot.status(), CurrentUserState::Unauthenticated);
}

#[test]
fn status_authenticated() {
    let snapshot = AuthSnapshot { user: Some(alice()), ..AuthSnapshot::default() };
    assert!(snapshot.is_authenticated());
    assert_eq!(snapshot.status(), CurrentUserState::Authenticated(alice()));
}

#[test]
fn status_loading_wins() {
    let snapshot = AuthSnapshot {
        user: Some(alice()),
        is_loading: true,
        error: Some("boom".into()),
        restored: true,
    };
    assert_eq!(snapshot.status(), CurrentUserState::Loading);
}

#[test]
fn status_error_only_when_signed_out() {
    let signed_out = AuthSnapshot { error: Some("Invalid email or password".into()), ..AuthSnapshot::default() };
    assert_eq!(signed_out.status(), CurrentUserState::Error("Invalid email or password".into()));

    let signed_in = AuthSnapshot { user: Some(alice()), error: Some("stale".into()), ..AuthSnapshot::default() };
    assert_eq!(signed_in.status(), CurrentUserState::Authenticated(alice()));
}
