//! Session controller: the single authority for who is signed in.
//!
//! ARCHITECTURE
//! ============
//! The controller owns a `watch` channel holding the current [`AuthSnapshot`]
//! and a `broadcast` channel of [`Route`] changes. Explicit operations
//! (`sign_up`, `login`, `logout`) and a background listener fed by the
//! backend's session-change stream are the only writers.
//!
//! Startup: the listener task first restores any session left over from a
//! previous run, marks the snapshot `restored`, then follows notifications
//! until the controller is dropped, which aborts the task and releases the
//! backend subscription.
//!
//! SEQUENCING
//! ==========
//! Every explicit operation bumps a generation counter when it starts. A
//! writer captures the generation before its suspension points and only
//! publishes if it is still current, so a notification that was mid-flight
//! when the user signed out cannot put the user back. The check runs under
//! the watch channel's lock, so it cannot interleave with a bump.
//!
//! TRADE-OFFS
//! ==========
//! Sign-out always publishes the signed-out state, even when the remote call
//! fails or times out; a stale remote session is preferred over a UI that
//! claims the user is still signed in.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::remote::{AuthBackend, AuthOutcome, Identity, SessionChange, SessionSubscription, TableBackend};
use crate::services::auth_error::{
    EMAIL_NOT_CONFIRMED_MESSAGE, SIGN_UP_CONFIRMATION_MESSAGE, TIMEOUT_MESSAGE, classify_auth_error,
};
use crate::services::profile::ensure_profile_exists;
use crate::state::{AuthSnapshot, Route};

/// Buffered route changes per navigation subscriber.
const ROUTE_CAPACITY: usize = 16;

pub struct SessionController {
    inner: Arc<Inner>,
    listener: JoinHandle<()>,
}

struct Inner {
    auth: Arc<dyn AuthBackend>,
    tables: Arc<dyn TableBackend>,
    timeout: Duration,
    state: watch::Sender<AuthSnapshot>,
    routes: broadcast::Sender<Route>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

impl SessionController {
    /// Build the controller and start session restoration in the background.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(auth: Arc<dyn AuthBackend>, tables: Arc<dyn TableBackend>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        let (routes, _) = broadcast::channel(ROUTE_CAPACITY);
        // Subscribe before restoring so no change between the two is lost.
        let subscription = auth.subscribe();
        let inner = Arc::new(Inner {
            auth,
            tables,
            timeout,
            state,
            routes,
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        });

        let task_inner = Arc::clone(&inner);
        let listener = tokio::spawn(async move {
            task_inner.restore().await;
            task_inner.listen(subscription).await;
        });

        Self { inner, listener }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// Receiver for route changes triggered by sign-in and sign-out.
    #[must_use]
    pub fn navigation(&self) -> broadcast::Receiver<Route> {
        self.inner.routes.subscribe()
    }

    /// Wait until startup session restoration has finished.
    pub async fn restored(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|snapshot| snapshot.restored).await;
    }

    /// Create an account. Remote errors are published verbatim.
    pub async fn sign_up(&self, email: &str, password: &str) {
        let inner = &self.inner;
        let (generation, _pending) = inner.begin();

        let raced = tokio::time::timeout(inner.timeout, inner.auth.create_account(email, password)).await;
        match raced {
            Err(_) => inner.fail(generation, "sign-up", TIMEOUT_MESSAGE),
            Ok(Err(e)) => {
                warn!(error = %e, code = ?e.code, "sign-up rejected");
                inner.fail(generation, "sign-up", &e.message);
            }
            Ok(Ok(AuthOutcome { session: Some(session), .. })) => inner.signed_in(generation, session.user).await,
            Ok(Ok(outcome)) => {
                info!(user_id = ?outcome.identity.map(|i| i.id), "account created; confirmation pending");
                inner.fail(generation, "sign-up", SIGN_UP_CONFIRMATION_MESSAGE);
            }
        }
    }

    /// Sign in with email and password. Remote errors are classified before
    /// publishing.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) {
        let inner = &self.inner;
        if remember_me {
            debug!("remember_me requested; sessions always persist");
        }
        let (generation, _pending) = inner.begin();

        let raced = tokio::time::timeout(inner.timeout, inner.auth.verify_credentials(email, password)).await;
        match raced {
            Err(_) => inner.fail(generation, "sign-in", TIMEOUT_MESSAGE),
            Ok(Err(e)) => {
                warn!(error = %e, code = ?e.code, "sign-in rejected");
                inner.fail(generation, "sign-in", &classify_auth_error(&e.message, e.code.as_deref()));
            }
            Ok(Ok(AuthOutcome { session: Some(session), .. })) => inner.signed_in(generation, session.user).await,
            // Credentials accepted but no session issued: the account still awaits confirmation.
            Ok(Ok(_)) => inner.fail(generation, "sign-in", EMAIL_NOT_CONFIRMED_MESSAGE),
        }
    }

    /// Sign out. Local state is always cleared, whatever the service says.
    pub async fn logout(&self) {
        let inner = &self.inner;
        inner.state.send_if_modified(|_| {
            inner.generation.fetch_add(1, Ordering::SeqCst);
            false
        });

        match tokio::time::timeout(inner.timeout, inner.auth.end_session()).await {
            Ok(Ok(())) => info!("signed out"),
            Ok(Err(e)) => warn!(error = %e, "sign-out failed; clearing local session anyway"),
            Err(_) => warn!("sign-out timed out; clearing local session anyway"),
        }

        inner.state.send_if_modified(|snapshot| {
            let changed = snapshot.user.is_some() || snapshot.error.is_some();
            snapshot.user = None;
            snapshot.error = None;
            changed
        });
        inner.navigate(Route::Entry);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

// =============================================================================
// INNER
// =============================================================================

/// Clears the pending flag when the owning operation finishes, however it ends.
struct PendingGuard<'a> {
    inner: &'a Inner,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let in_flight = &self.inner.in_flight;
        self.inner.state.send_if_modified(|snapshot| {
            let remaining = in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            let loading = remaining > 0;
            let changed = snapshot.is_loading != loading;
            snapshot.is_loading = loading;
            changed
        });
    }
}

impl Inner {
    /// Start an explicit operation: bump the generation, enter Pending, clear
    /// the previous error.
    fn begin(&self) -> (u64, PendingGuard<'_>) {
        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            snapshot.is_loading = true;
            snapshot.error = None;
        });
        (generation, PendingGuard { inner: self })
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Apply `update` only if no explicit operation started since `generation`
    /// was captured. Returns whether the update was applied.
    fn publish_if_current(&self, generation: u64, update: impl FnOnce(&mut AuthSnapshot)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|snapshot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            applied = true;
            let before = snapshot.clone();
            update(snapshot);
            *snapshot != before
        });
        applied
    }

    fn navigate(&self, route: Route) {
        // No receivers is fine: nobody is rendering.
        let _ = self.routes.send(route);
    }

    fn fail(&self, generation: u64, operation: &str, message: &str) {
        if !self.publish_if_current(generation, |snapshot| snapshot.error = Some(message.to_owned())) {
            debug!(operation, "superseded; result dropped");
        }
    }

    async fn signed_in(&self, generation: u64, identity: Identity) {
        ensure_profile_exists(self.tables.as_ref(), &identity.id, &identity.email).await;
        let user_id = identity.id.clone();
        let applied = self.publish_if_current(generation, |snapshot| {
            snapshot.user = Some(identity);
            snapshot.error = None;
        });
        if applied {
            info!(%user_id, "signed in");
            self.navigate(Route::Tasks);
        } else {
            debug!(%user_id, "sign-in superseded; result dropped");
        }
    }

    /// Adopt an identity the backend reported on its own (restoration or
    /// notification). No navigation.
    async fn observed(&self, generation: u64, identity: Identity) {
        ensure_profile_exists(self.tables.as_ref(), &identity.id, &identity.email).await;
        let user_id = identity.id.clone();
        let applied = self.publish_if_current(generation, |snapshot| {
            snapshot.user = Some(identity);
            snapshot.error = None;
        });
        if !applied {
            debug!(%user_id, "stale session notification dropped");
        }
    }

    async fn restore(&self) {
        let generation = self.current_generation();
        match tokio::time::timeout(self.timeout, self.auth.current_session()).await {
            Ok(Ok(Some(session))) => {
                info!(user_id = %session.user.id, "session restored");
                self.observed(generation, session.user).await;
            }
            Ok(Ok(None)) => debug!("no session to restore"),
            Ok(Err(e)) => warn!(error = %e, "session restoration failed"),
            Err(_) => warn!("session restoration timed out"),
        }
        self.state.send_modify(|snapshot| snapshot.restored = true);
    }

    async fn listen(&self, mut subscription: SessionSubscription) {
        while let Some(change) = subscription.latest().await {
            self.apply_change(change).await;
        }
        debug!("session change stream closed");
    }

    async fn apply_change(&self, change: SessionChange) {
        let generation = self.current_generation();
        debug!(event = ?change.event, "session change");
        match change.session {
            Some(session) => self.observed(generation, session.user).await,
            None => {
                self.publish_if_current(generation, |snapshot| snapshot.user = None);
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
