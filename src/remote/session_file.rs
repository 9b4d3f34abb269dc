//! On-disk session persistence for the REST adapter.
//!
//! The hosted service's browser SDK keeps the session in local storage; a
//! terminal client keeps it in a JSON file so the next run can restore it.
//! Persistence is best-effort: read and write failures are logged and the
//! session simply lives in memory for this run.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::Session;

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session. A corrupt file is removed.
    pub async fn load(&self) -> Option<Session> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "session file unreadable");
                return None;
            }
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "session file corrupt; discarding");
                self.clear().await;
                None
            }
        }
    }

    pub async fn save(&self, session: &Session) {
        if let Err(e) = self.write(session).await {
            warn!(error = %e, path = %self.path.display(), "session file write failed");
        }
    }

    async fn write(&self, session: &Session) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    pub async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "session file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "session file removal failed"),
        }
    }
}

#[cfg(test)]
#[path = "session_file_test.rs"]
mod tests;
