//! Domain services driven by the front-end.
//!
//! ARCHITECTURE
//! ============
//! `session` is the single authority for who is signed in; `tasks` owns the
//! signed-in user's rows. Both talk to the remote service only through the
//! `remote` traits so front-ends stay focused on input and rendering.

pub mod auth_error;
pub mod forms;
pub mod profile;
pub mod session;
pub mod tasks;
pub mod validation;
