//! HTTP adapter for the hosted identity + storage service.
//!
//! Speaks a GoTrue-compatible auth API under `/auth/v1` and a
//! PostgREST-compatible table API under `/rest/v1`. Thin wrapper over
//! `reqwest`; response parsing lives in pure functions for testability.
//!
//! SESSION LIFECYCLE
//! =================
//! The active session is held in memory and mirrored to a [`SessionFile`].
//! `current_session` restores it from disk and refreshes it when it is
//! about to expire; a refresh the service rejects drops the session and
//! announces `SignedOut`, which is how expiry reaches the controller.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::SESSION_CHANGE_CAPACITY;
use super::session_file::SessionFile;
use super::types::{
    AuthBackend, AuthOutcome, Identity, Query, RemoteError, Session, SessionChange, SessionSubscription, TableBackend,
    unix_now,
};
use crate::config::RestConfig;

const AUTH_PATH: &str = "auth/v1";
const REST_PATH: &str = "rest/v1";
/// Refresh this many seconds before the access token expires.
const REFRESH_LEEWAY_SECS: i64 = 30;
/// Assumed lifetime when the service reports neither `expires_at` nor `expires_in`.
const DEFAULT_SESSION_LIFETIME_SECS: i64 = 3600;

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestBackend {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    session: Mutex<Option<Session>>,
    store: SessionFile,
    changes: broadcast::Sender<SessionChange>,
}

impl RestBackend {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RestConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| RemoteError::new(format!("HTTP client build failed: {e}")))?;
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            session: Mutex::new(None),
            store: SessionFile::new(config.session_file.clone()),
            changes,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/{AUTH_PATH}/{path}", self.api_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{REST_PATH}/{table}", self.api_url)
    }

    fn auth_request(&self, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .post(self.auth_url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer.unwrap_or(&self.api_key))
    }

    async fn table_request(&self, method: Method, table: &str, query: &Query) -> Result<RequestBuilder, RemoteError> {
        let token = match self.current_session().await? {
            Some(session) => session.access_token,
            None => self.api_key.clone(),
        };
        Ok(self
            .http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .query(&query_pairs(query)))
    }

    /// Adopt a freshly issued session: memory, disk, subscribers.
    async fn adopt(&self, session: Session, change: SessionChange) {
        *self.session.lock().await = Some(session.clone());
        self.store.save(&session).await;
        let _ = self.changes.send(change);
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, RemoteError> {
        let response = self
            .auth_request("token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(RemoteError::transport)?;
        parse_session(&read_json(response).await?, unix_now())
    }
}

async fn read_json(response: Response) -> Result<Value, RemoteError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(RemoteError::transport)?;
    if !(200..300).contains(&status) {
        return Err(parse_error_body(status, &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| RemoteError::new(format!("unexpected response: {e}")).with_status(status))
}

#[async_trait::async_trait]
impl AuthBackend for RestBackend {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        let response = self
            .auth_request("signup", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let outcome = parse_signup(&read_json(response).await?, unix_now())?;
        if let Some(session) = &outcome.session {
            self.adopt(session.clone(), SessionChange::signed_in(session.clone()))
                .await;
        }
        Ok(outcome)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<AuthOutcome, RemoteError> {
        let response = self
            .auth_request("token?grant_type=password", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let session = parse_session(&read_json(response).await?, unix_now())?;
        self.adopt(session.clone(), SessionChange::signed_in(session.clone()))
            .await;
        Ok(AuthOutcome::signed_in(session))
    }

    async fn current_session(&self) -> Result<Option<Session>, RemoteError> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            *slot = self.store.load().await;
        }
        let Some(session) = slot.clone() else {
            return Ok(None);
        };
        if !session.is_expired(unix_now(), REFRESH_LEEWAY_SECS) {
            return Ok(Some(session));
        }

        debug!(user_id = %session.user.id, "access token expiring; refreshing");
        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                *slot = Some(fresh.clone());
                self.store.save(&fresh).await;
                let _ = self.changes.send(SessionChange::refreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            // The service answered and said no: the session is gone for good.
            Err(e) if e.status.is_some() => {
                warn!(error = %e, user_id = %session.user.id, "session refresh rejected; signing out");
                *slot = None;
                self.store.clear().await;
                let _ = self.changes.send(SessionChange::signed_out());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.changes.subscribe())
    }

    async fn end_session(&self) -> Result<(), RemoteError> {
        let stored = {
            let mut slot = self.session.lock().await;
            match slot.take() {
                Some(session) => Some(session),
                None => self.store.load().await,
            }
        };
        let Some(session) = stored else {
            return Ok(());
        };

        // Local state goes first: the remote call below may never settle.
        self.store.clear().await;
        let _ = self.changes.send(SessionChange::signed_out());

        let result = match self
            .auth_request("logout", Some(&session.access_token))
            .send()
            .await
        {
            Ok(response) => read_json(response).await.map(|_| ()),
            Err(e) => Err(RemoteError::transport(e)),
        };
        info!(user_id = %session.user.id, remote_ok = result.is_ok(), "session ended");
        result
    }
}

#[async_trait::async_trait]
impl TableBackend for RestBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .table_request(Method::GET, table, query)
            .await?
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(RemoteError::transport)?;
        Ok(into_rows(read_json(response).await?))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let response = self
            .table_request(Method::POST, table, &Query::new())
            .await?
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        into_rows(read_json(response).await?)
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::new(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .table_request(Method::PATCH, table, query)
            .await?
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        Ok(into_rows(read_json(response).await?))
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), RemoteError> {
        let response = self
            .table_request(Method::DELETE, table, query)
            .await?
            .send()
            .await
            .map_err(RemoteError::transport)?;
        read_json(response).await.map(|_| ())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Deserialize)]
struct SessionWire {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: UserWire,
}

#[derive(serde::Deserialize)]
struct UserWire {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserWire> for Identity {
    fn from(user: UserWire) -> Self {
        Self { id: user.id, email: user.email.unwrap_or_default() }
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_session(value: &Value, now: i64) -> Result<Session, RemoteError> {
    let wire = SessionWire::deserialize(value).map_err(|e| RemoteError::new(format!("malformed session: {e}")))?;
    let expires_at = wire
        .expires_at
        .or_else(|| wire.expires_in.map(|secs| now + secs))
        .unwrap_or(now + DEFAULT_SESSION_LIFETIME_SECS);
    Ok(Session {
        access_token: wire.access_token,
        refresh_token: wire.refresh_token,
        expires_at,
        user: wire.user.into(),
    })
}

/// Sign-up answers with a full session when the account is usable right
/// away, or with the bare user when email confirmation is pending.
fn parse_signup(value: &Value, now: i64) -> Result<AuthOutcome, RemoteError> {
    if value.get("access_token").is_some() {
        return parse_session(value, now).map(AuthOutcome::signed_in);
    }
    let user = value.get("user").unwrap_or(value);
    let user = UserWire::deserialize(user).map_err(|e| RemoteError::new(format!("malformed user: {e}")))?;
    Ok(AuthOutcome::pending_confirmation(user.into()))
}

/// Normalize the service's several error body shapes into a [`RemoteError`].
fn parse_error_body(status: u16, body: &str) -> RemoteError {
    let value = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);

    let message = text("msg")
        .or_else(|| text("message"))
        .or_else(|| text("error_description"))
        .or_else(|| text("error"))
        .or_else(|| Some(body.trim().to_owned()).filter(|b| !b.is_empty() && value.is_null()))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    let code = text("error_code").or_else(|| text("code")).or_else(|| text("error"));

    let err = RemoteError::new(message).with_status(status);
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = query
        .filters
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{value}")))
        .collect::<Vec<_>>();
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_owned(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_owned(), limit.to_string()));
    }
    pairs
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
