use super::*;
use crate::remote::{
    AuthBackend, AuthOutcome, Identity, MemoryBackend, RemoteError, Session, SessionChange, SessionSubscription,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Records which auth calls reached the service.
struct CountingAuth {
    changes: broadcast::Sender<SessionChange>,
    calls: Mutex<Vec<(&'static str, String, String)>>,
}

impl CountingAuth {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self { changes, calls: Mutex::new(vec![]) }
    }

    fn record(&self, call: &'static str, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        self.calls.lock().unwrap().push((call, email.to_owned(), password.to_owned()));
        Ok(AuthOutcome::signed_in(Session {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: i64::from(u32::MAX),
            user: Identity { id: "u1".into(), email: email.to_owned() },
        }))
    }

    fn calls(&self) -> Vec<(&'static str, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuthBackend for CountingAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        self.record("create_account", email, password)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        self.record("verify_credentials", email, password)
    }

    async fn current_session(&self) -> Result<Option<Session>, RemoteError> {
        Ok(None)
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.changes.subscribe())
    }

    async fn end_session(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

async fn controller(auth: &Arc<CountingAuth>) -> SessionController {
    let ctrl = SessionController::new(auth.clone(), Arc::new(MemoryBackend::new()), Duration::from_secs(10));
    ctrl.restored().await;
    ctrl
}

#[tokio::test]
async fn short_password_never_reaches_the_service() {
    let auth = Arc::new(CountingAuth::new());
    let ctrl = controller(&auth).await;

    let errors = submit_login(&ctrl, "a@b.com", "short", false, 8).await.unwrap_err();
    assert_eq!(errors.email, None);
    assert_eq!(errors.password.as_deref(), Some("Password must be at least 8 characters"));

    let errors = submit_sign_up(&ctrl, "a@b.com", "short", 8).await.unwrap_err();
    assert_eq!(errors.password.as_deref(), Some("Password must be at least 8 characters"));

    assert!(auth.calls().is_empty());
    assert!(!ctrl.snapshot().is_loading);
    assert!(ctrl.snapshot().error.is_none());
}

#[tokio::test]
async fn malformed_email_never_reaches_the_service() {
    let auth = Arc::new(CountingAuth::new());
    let ctrl = controller(&auth).await;

    let errors = submit_login(&ctrl, "alice@example", "password123", false, 8).await.unwrap_err();
    assert_eq!(errors.email.as_deref(), Some("Email is invalid"));
    assert_eq!(errors.password, None);

    let errors = submit_sign_up(&ctrl, "", "", 8).await.unwrap_err();
    assert_eq!(errors.email.as_deref(), Some("Email is required"));
    assert_eq!(errors.password.as_deref(), Some("Password is required"));

    assert!(auth.calls().is_empty());
}

#[tokio::test]
async fn valid_forms_submit_once_with_trimmed_email() {
    let auth = Arc::new(CountingAuth::new());
    let ctrl = controller(&auth).await;

    submit_login(&ctrl, "  alice@example.com ", "password123", true, 8).await.unwrap();
    submit_sign_up(&ctrl, "bob@example.com", "password123", 8).await.unwrap();

    assert_eq!(
        auth.calls(),
        vec![
            ("verify_credentials", "alice@example.com".to_owned(), "password123".to_owned()),
            ("create_account", "bob@example.com".to_owned(), "password123".to_owned()),
        ]
    );
}
