//! In-process stand-in for the hosted identity + storage service.
//!
//! DESIGN
//! ======
//! Mirrors the hosted service's observable behavior closely enough to run
//! the app offline and to test the session controller without a network:
//! accounts keyed by normalized email, one active session, JSON rows per
//! table, and row ownership enforced per table (`profiles.id`,
//! `todos.user_id`). Sessions are announced on a broadcast channel the same
//! way the REST adapter announces them.
//!
//! TRADE-OFFS
//! ==========
//! Passwords are kept in plain text; this backend never leaves the process.

use std::collections::HashMap;
use std::fmt::Write;

use rand::Rng;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use super::SESSION_CHANGE_CAPACITY;
use super::types::{
    AuthBackend, AuthOutcome, Identity, OWNER_COLUMN, PROFILES_TABLE, Query, RemoteError, Session, SessionChange,
    SessionSubscription, TODOS_TABLE, TableBackend, UNIQUE_VIOLATION_CODE, unix_now, value_text,
};

const SESSION_LIFETIME_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;
const RLS_VIOLATION_CODE: &str = "42501";

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    tables: HashMap<String, Vec<Value>>,
    next_row: u64,
}

/// In-memory [`AuthBackend`] + [`TableBackend`].
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<SessionChange>,
    /// Table name -> column that must equal the signed-in identity id.
    owners: HashMap<String, String>,
    require_confirmation: bool,
}

impl MemoryBackend {
    /// Backend that signs new accounts in immediately.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);
        let owners = HashMap::from([
            (PROFILES_TABLE.to_owned(), "id".to_owned()),
            (TODOS_TABLE.to_owned(), OWNER_COLUMN.to_owned()),
        ]);
        Self { state: Mutex::new(MemoryState::default()), changes, owners, require_confirmation: false }
    }

    /// New accounts must confirm their email before a session is issued.
    #[must_use]
    pub fn with_email_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// Mark an account's email as confirmed. Returns `false` for unknown accounts.
    pub async fn confirm_email(&self, email: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&normalize(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Every row in `table`, ignoring ownership.
    #[cfg(test)]
    pub(crate) async fn rows(&self, table: &str) -> Vec<Value> {
        self.state.lock().await.tables.get(table).cloned().unwrap_or_default()
    }

    fn issue_session(&self, state: &mut MemoryState, identity: Identity) -> Session {
        let session = Session {
            access_token: generate_token(),
            refresh_token: generate_token(),
            expires_at: unix_now() + SESSION_LIFETIME_SECS,
            user: identity,
        };
        state.session = Some(session.clone());
        let _ = self.changes.send(SessionChange::signed_in(session.clone()));
        session
    }

    /// Ownership predicate for `table` under the current session.
    fn visible(&self, state: &MemoryState, table: &str, row: &Value) -> bool {
        let Some(column) = self.owners.get(table) else {
            return true;
        };
        let Some(session) = &state.session else {
            return false;
        };
        row.get(column).is_some_and(|v| value_text(v) == session.user.id)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn invalid_credentials() -> RemoteError {
    RemoteError::new("Invalid login credentials")
        .with_code("invalid_credentials")
        .with_status(400)
}

#[async_trait::async_trait]
impl AuthBackend for MemoryBackend {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RemoteError::new(format!("Password should be at least {MIN_PASSWORD_LEN} characters."))
                .with_code("weak_password")
                .with_status(422));
        }

        let mut state = self.state.lock().await;
        let email = normalize(email);
        if state.accounts.contains_key(&email) {
            return Err(RemoteError::new("User already registered")
                .with_code("user_already_exists")
                .with_status(422));
        }

        let identity = Identity { id: uuid::Uuid::new_v4().to_string(), email: email.clone() };
        let confirmed = !self.require_confirmation;
        state
            .accounts
            .insert(email, Account { identity: identity.clone(), password: password.to_owned(), confirmed });
        info!(user_id = %identity.id, confirmed, "account created");

        if confirmed {
            Ok(AuthOutcome::signed_in(self.issue_session(&mut state, identity)))
        } else {
            Ok(AuthOutcome::pending_confirmation(identity))
        }
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        let mut state = self.state.lock().await;
        let Some(account) = state.accounts.get(&normalize(email)).cloned() else {
            return Err(invalid_credentials());
        };
        if account.password != password {
            return Err(invalid_credentials());
        }
        if !account.confirmed {
            return Err(RemoteError::new("Email not confirmed")
                .with_code("email_not_confirmed")
                .with_status(400));
        }
        Ok(AuthOutcome::signed_in(self.issue_session(&mut state, account.identity)))
    }

    async fn current_session(&self) -> Result<Option<Session>, RemoteError> {
        let mut state = self.state.lock().await;
        let expired = state
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(unix_now(), 0));
        if expired {
            debug!("stored session expired");
            state.session = None;
            let _ = self.changes.send(SessionChange::signed_out());
        }
        Ok(state.session.clone())
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.changes.subscribe())
    }

    async fn end_session(&self) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        if state.session.take().is_some() {
            let _ = self.changes.send(SessionChange::signed_out());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError> {
        let state = self.state.lock().await;
        let mut rows = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| self.visible(&state, table, row) && query.matches(row))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            // Stable sort: rows with equal keys keep insertion order.
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ordering } else { ordering.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock().await;
        let Value::Object(mut fields) = row else {
            return Err(RemoteError::new("row must be a JSON object").with_status(400));
        };

        state.next_row += 1;
        let seq = state.next_row;
        fields
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        fields.entry("created_at").or_insert_with(|| json!(seq));
        let row = Value::Object(fields);

        if !self.visible(&state, table, &row) {
            return Err(RemoteError::new(format!("new row violates row-level security policy for table \"{table}\""))
                .with_code(RLS_VIOLATION_CODE)
                .with_status(403));
        }

        let rows = state.tables.entry(table.to_owned()).or_default();
        let id = row.get("id").map(value_text);
        if rows.iter().any(|existing| existing.get("id").map(value_text) == id) {
            return Err(RemoteError::new(format!("duplicate key value violates unique constraint \"{table}_pkey\""))
                .with_code(UNIQUE_VIOLATION_CODE)
                .with_status(409));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError> {
        let Value::Object(patch) = patch else {
            return Err(RemoteError::new("patch must be a JSON object").with_status(400));
        };

        let mut state = self.state.lock().await;
        let mut rows = state.tables.remove(table).unwrap_or_default();
        let mut updated = Vec::new();
        for row in &mut rows {
            if !(self.visible(&state, table, row) && query.matches(row)) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        state.tables.insert(table.to_owned(), rows);
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        let rows = state.tables.remove(table).unwrap_or_default();
        let kept: Vec<Value> = rows
            .into_iter()
            .filter(|row| !(self.visible(&state, table, row) && query.matches(row)))
            .collect();
        state.tables.insert(table.to_owned(), kept);
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
