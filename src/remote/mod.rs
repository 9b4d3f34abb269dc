//! Remote identity + storage service adapters.
//!
//! ARCHITECTURE
//! ============
//! The hosted service is consumed through two traits, [`AuthBackend`] and
//! [`TableBackend`]. `RestBackend` speaks the service's HTTP API;
//! `MemoryBackend` keeps everything in-process for offline runs and tests.
//! Both emit session changes on a broadcast channel that the session
//! controller subscribes to.

pub mod memory;
pub mod rest;
pub mod session_file;
pub mod types;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use types::{
    AuthBackend, AuthEvent, AuthOutcome, Identity, OWNER_COLUMN, PROFILES_TABLE, Query, RemoteError, Session,
    SessionChange, SessionSubscription, TODOS_TABLE, TableBackend,
};

/// Capacity of each backend's session-change broadcast channel.
pub(crate) const SESSION_CHANGE_CAPACITY: usize = 16;
