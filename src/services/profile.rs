//! Lazy per-identity profile rows.
//!
//! TRADE-OFFS
//! ==========
//! Existence check then insert, not transactional. Two concurrent callers can
//! both miss the row; the loser's insert fails with a unique violation, which
//! is treated as success.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::remote::{PROFILES_TABLE, Query, TableBackend};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
}

/// Make sure `identity_id` has a profile row. Best effort: every failure is
/// logged and swallowed.
pub async fn ensure_profile_exists(tables: &dyn TableBackend, identity_id: &str, email: &str) {
    let query = Query::new().eq("id", identity_id).limit(1);
    match tables.select(PROFILES_TABLE, &query).await {
        Ok(rows) if !rows.is_empty() => return,
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, user_id = %identity_id, "profile lookup failed");
            return;
        }
    }

    let profile = Profile { id: identity_id.to_owned(), email: email.to_owned() };
    match tables.insert(PROFILES_TABLE, json!(profile)).await {
        Ok(_) => info!(user_id = %identity_id, "profile created"),
        Err(e) if e.is_unique_violation() => debug!(user_id = %identity_id, "profile created concurrently"),
        Err(e) => warn!(error = %e, user_id = %identity_id, "profile insert failed"),
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
