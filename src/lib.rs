//! taskdeck: a personal task list backed by a hosted identity + table service.
//!
//! ARCHITECTURE
//! ============
//! `remote` adapts the hosted service (REST or in-process), `services` holds
//! the session controller and task list, `state` is the read-only contract
//! front-ends render from, and `config` reads the environment.

pub mod config;
pub mod remote;
pub mod services;
pub mod state;
