//! Remote service types: identities, sessions, table queries, errors.
//!
//! Provider-neutral: shared by the REST adapter and the in-memory adapter,
//! and the only vocabulary the session controller and task list speak.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

/// Table holding one profile row per identity, keyed by identity id.
pub const PROFILES_TABLE: &str = "profiles";
/// Table holding task rows, filtered by [`OWNER_COLUMN`].
pub const TODOS_TABLE: &str = "todos";
/// Ownership column on [`TODOS_TABLE`].
pub const OWNER_COLUMN: &str = "user_id";
/// Postgres `unique_violation` SQLSTATE, surfaced by the table API on duplicate keys.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

// =============================================================================
// ERROR
// =============================================================================

/// Error reported by the remote service or by the adapter talking to it.
///
/// `message` is the human-readable text the service sent; `code` is its
/// machine-readable error code when one was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl RemoteError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None, status: None }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The request never produced a response (DNS, TLS, connect, body read).
    #[must_use]
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(format!("network request failed: {err}"))
    }

    /// `true` when the service rejected an insert because the key already exists.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
    }
}

// =============================================================================
// IDENTITY + SESSION
// =============================================================================

/// An account known to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// A session issued by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as unix seconds.
    pub expires_at: i64,
    pub user: Identity,
}

impl Session {
    /// `true` once `now` is within `leeway_secs` of expiry.
    #[must_use]
    pub fn is_expired(&self, now: i64, leeway_secs: i64) -> bool {
        self.expires_at <= now + leeway_secs
    }
}

/// Result of account creation or credential verification.
///
/// A service that requires email confirmation creates the identity but
/// issues no session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
}

impl AuthOutcome {
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self { identity: Some(session.user.clone()), session: Some(session) }
    }

    #[must_use]
    pub fn pending_confirmation(identity: Identity) -> Self {
        Self { identity: Some(identity), session: None }
    }

    #[must_use]
    pub fn session_issued(&self) -> bool {
        self.session.is_some()
    }
}

// =============================================================================
// SESSION CHANGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Push notification emitted by a backend whenever its session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self { event: AuthEvent::SignedIn, session: Some(session) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { event: AuthEvent::SignedOut, session: None }
    }

    #[must_use]
    pub fn refreshed(session: Session) -> Self {
        Self { event: AuthEvent::TokenRefreshed, session: Some(session) }
    }
}

/// Receiving end of a backend's session-change stream.
///
/// Dropping the subscription releases it.
pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionChange>,
}

impl SessionSubscription {
    #[must_use]
    pub fn new(rx: broadcast::Receiver<SessionChange>) -> Self {
        Self { rx }
    }

    /// Wait for the next change. Returns `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<SessionChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                // EDGE: a lagging subscriber only loses intermediate states; the next
                // change still carries the latest session.
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "session change subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next change, then skip ahead to the newest one queued.
    ///
    /// Every change carries the full session, so intermediate ones can be
    /// dropped without losing state.
    pub async fn latest(&mut self) -> Option<SessionChange> {
        let mut change = self.next().await?;
        loop {
            match self.rx.try_recv() {
                Ok(newer) => change = newer,
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "session change subscriber lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return Some(change),
            }
        }
    }
}

// =============================================================================
// TABLE QUERIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row filter for table calls: equality filters, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_owned(), value.to_string()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order { column: column.to_owned(), ascending });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `row` satisfies every equality filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).is_some_and(|v| value_text(v) == *expected))
    }
}

/// Text form of a JSON scalar as it appears in an equality filter.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

// =============================================================================
// BACKEND TRAITS
// =============================================================================

/// Identity half of the remote service.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns the service's rejection (duplicate account, weak password, ...).
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError>;

    /// Exchange email + password for a session.
    ///
    /// # Errors
    ///
    /// Returns the service's rejection, e.g. `Invalid login credentials`.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError>;

    /// Restore the current session, if any survives from a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error when the service cannot be reached.
    async fn current_session(&self) -> Result<Option<Session>, RemoteError>;

    /// Subscribe to session changes.
    fn subscribe(&self) -> SessionSubscription;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an error when the service rejects or never receives the sign-out.
    async fn end_session(&self) -> Result<(), RemoteError>;
}

/// Row storage half of the remote service. Rows are JSON objects; row
/// ownership is enforced by the service.
#[async_trait::async_trait]
pub trait TableBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns the service's rejection or a transport error.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError>;

    /// Insert one row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns the service's rejection (e.g. [`UNIQUE_VIOLATION_CODE`]) or a transport error.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Apply `patch` to every matching row and return the updated rows.
    ///
    /// # Errors
    ///
    /// Returns the service's rejection or a transport error.
    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError>;

    /// # Errors
    ///
    /// Returns the service's rejection or a transport error.
    async fn delete(&self, table: &str, query: &Query) -> Result<(), RemoteError>;
}

/// Current time as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
