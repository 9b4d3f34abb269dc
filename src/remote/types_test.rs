use super::*;
use serde_json::json;

fn session(expires_at: i64) -> Session {
    Session {
        access_token: "access".into(),
        refresh_token: "refresh".into(),
        expires_at,
        user: Identity { id: "u1".into(), email: "a@b.com".into() },
    }
}

// =============================================================================
// RemoteError
// =============================================================================

#[test]
fn remote_error_displays_message_only() {
    let err = RemoteError::new("Invalid login credentials")
        .with_code("invalid_credentials")
        .with_status(400);
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(err.code.as_deref(), Some("invalid_credentials"));
    assert_eq!(err.status, Some(400));
}

#[test]
fn remote_error_unique_violation() {
    assert!(RemoteError::new("dup").with_code("23505").is_unique_violation());
    assert!(!RemoteError::new("dup").is_unique_violation());
    assert!(!RemoteError::new("x").with_code("42501").is_unique_violation());
}

#[test]
fn remote_error_transport_wraps_cause() {
    let err = RemoteError::transport("connection refused");
    assert!(err.message.contains("connection refused"));
    assert!(err.code.is_none());
}

// =============================================================================
// Session / AuthOutcome
// =============================================================================

#[test]
fn session_expiry_honours_leeway() {
    let s = session(1_000);
    assert!(!s.is_expired(900, 10));
    assert!(s.is_expired(990, 10));
    assert!(s.is_expired(1_000, 0));
}

#[test]
fn auth_outcome_constructors() {
    let signed_in = AuthOutcome::signed_in(session(1));
    assert!(signed_in.session_issued());
    assert_eq!(signed_in.identity.as_ref().map(|i| i.id.as_str()), Some("u1"));

    let pending = AuthOutcome::pending_confirmation(Identity { id: "u2".into(), email: "x@y.z".into() });
    assert!(!pending.session_issued());
    assert!(pending.identity.is_some());
}

#[test]
fn session_serde_shape() {
    let json = serde_json::to_value(session(42)).unwrap();
    assert_eq!(json["expires_at"], 42);
    assert_eq!(json["user"]["email"], "a@b.com");
}

// =============================================================================
// Query
// =============================================================================

#[test]
fn query_matches_all_filters() {
    let row = json!({ "id": "t1", "user_id": "u1", "completed": false, "rank": 3 });
    assert!(Query::new().matches(&row));
    assert!(Query::new().eq("id", "t1").eq("user_id", "u1").matches(&row));
    assert!(Query::new().eq("completed", false).matches(&row));
    assert!(Query::new().eq("rank", 3).matches(&row));
    assert!(!Query::new().eq("id", "t2").matches(&row));
    assert!(!Query::new().eq("missing", "x").matches(&row));
}

#[test]
fn query_builder_records_order_and_limit() {
    let q = Query::new().eq("id", "1").order_by("created_at", false).limit(5);
    assert_eq!(q.filters, vec![("id".to_owned(), "1".to_owned())]);
    assert_eq!(q.order, Some(Order { column: "created_at".into(), ascending: false }));
    assert_eq!(q.limit, Some(5));
}

#[test]
fn value_text_scalars() {
    assert_eq!(value_text(&json!("abc")), "abc");
    assert_eq!(value_text(&json!(true)), "true");
    assert_eq!(value_text(&json!(12)), "12");
    assert_eq!(value_text(&Value::Null), "null");
}

// =============================================================================
// SessionSubscription
// =============================================================================

#[tokio::test]
async fn subscription_yields_changes_then_none_when_closed() {
    let (tx, rx) = broadcast::channel(4);
    let mut sub = SessionSubscription::new(rx);
    tx.send(SessionChange::signed_out()).unwrap();
    drop(tx);
    assert_eq!(sub.next().await, Some(SessionChange::signed_out()));
    assert_eq!(sub.next().await, None);
}

#[tokio::test]
async fn subscription_skips_lagged_changes() {
    let (tx, rx) = broadcast::channel(1);
    let mut sub = SessionSubscription::new(rx);
    tx.send(SessionChange::signed_out()).unwrap();
    tx.send(SessionChange::signed_in(session(5))).unwrap();
    let next = sub.next().await.unwrap();
    assert_eq!(next.event, AuthEvent::SignedIn);
}

#[tokio::test]
async fn subscription_latest_skips_to_newest_queued() {
    let (tx, rx) = broadcast::channel(8);
    let mut sub = SessionSubscription::new(rx);
    tx.send(SessionChange::signed_in(session(5))).unwrap();
    tx.send(SessionChange::signed_out()).unwrap();
    tx.send(SessionChange::refreshed(session(9))).unwrap();
    let latest = sub.latest().await.unwrap();
    assert_eq!(latest.event, AuthEvent::TokenRefreshed);
    assert_eq!(latest.session.map(|s| s.expires_at), Some(9));

    tx.send(SessionChange::signed_out()).unwrap();
    assert_eq!(sub.latest().await, Some(SessionChange::signed_out()));
}
