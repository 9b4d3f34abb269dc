//! Auth-session state published to the presentation layer.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session controller is the only writer; front-ends read snapshots or
//! watch for changes and decide what to render from them.

use crate::remote::Identity;

/// Read-only view of who is signed in and what the last auth call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<Identity>,
    /// A sign-in or sign-up is in flight.
    pub is_loading: bool,
    /// User-facing message from the most recent failed auth call.
    pub error: Option<String>,
    /// Startup session restoration has finished.
    pub restored: bool,
}

/// Coarse user state derived from an [`AuthSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurrentUserState {
    Unauthenticated,
    Authenticated(Identity),
    Loading,
    Error(String),
}

impl AuthSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Loading wins over everything, then a signed-in user, then an error.
    #[must_use]
    pub fn status(&self) -> CurrentUserState {
        if self.is_loading {
            return CurrentUserState::Loading;
        }
        match (&self.user, &self.error) {
            (Some(user), _) => CurrentUserState::Authenticated(user.clone()),
            (None, Some(message)) => CurrentUserState::Error(message.clone()),
            (None, None) => CurrentUserState::Unauthenticated,
        }
    }
}

/// Screen the front-end should move to after an auth transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Sign-in / sign-up screen.
    Entry,
    /// The signed-in user's task list.
    Tasks,
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
