//! The signed-in user's task list.
//!
//! DESIGN
//! ======
//! `TaskList` mirrors the owner's rows in the `todos` table. Every mutation
//! goes to the service first; the local copy only changes once the service
//! accepted it, so the list never shows a state the service does not have.
//!
//! TRADE-OFFS
//! ==========
//! Failures are logged and swallowed. Callers learn whether anything changed
//! from the returned flag, not why it did not.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::remote::{OWNER_COLUMN, Query, TODOS_TABLE, TableBackend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Row id; the service may use numeric or uuid keys.
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid task id: {other}"))),
    }
}

/// Decode table rows, dropping any that do not look like tasks.
fn parse_tasks(rows: Vec<Value>) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Task>(row) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, "skipping malformed task row");
                None
            }
        })
        .collect()
}

pub struct TaskList {
    tables: Arc<dyn TableBackend>,
    owner: String,
    tasks: Vec<Task>,
}

impl TaskList {
    #[must_use]
    pub fn new(tables: Arc<dyn TableBackend>, owner: impl Into<String>) -> Self {
        Self { tables, owner: owner.into(), tasks: Vec::new() }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Local copy, in creation order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn row_query(&self, id: &str) -> Query {
        Query::new().eq("id", id).eq(OWNER_COLUMN, &self.owner)
    }

    fn position(&self, id: &str) -> Option<usize> {
        let index = self.tasks.iter().position(|t| t.id == id);
        if index.is_none() {
            debug!(task_id = %id, "unknown task; ignoring");
        }
        index
    }

    /// Replace the local copy with the owner's rows, oldest first.
    pub async fn load(&mut self) -> bool {
        let query = Query::new().eq(OWNER_COLUMN, &self.owner).order_by("created_at", true);
        match self.tables.select(TODOS_TABLE, &query).await {
            Ok(rows) => {
                self.tasks = parse_tasks(rows);
                debug!(owner = %self.owner, count = self.tasks.len(), "tasks loaded");
                true
            }
            Err(e) => {
                warn!(error = %e, owner = %self.owner, "loading tasks failed");
                false
            }
        }
    }

    /// Insert a new, incomplete task. Blank text is ignored.
    pub async fn add(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let row = json!({ "text": text, "completed": false, OWNER_COLUMN: self.owner });
        let stored = match self.tables.insert(TODOS_TABLE, row).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "adding task failed");
                return false;
            }
        };
        match serde_json::from_value::<Task>(stored) {
            Ok(task) => {
                info!(task_id = %task.id, "task added");
                self.tasks.push(task);
                true
            }
            Err(e) => {
                warn!(error = %e, "service returned malformed task; reloading");
                self.load().await
            }
        }
    }

    /// Flip `completed` on one task.
    pub async fn toggle_complete(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let completed = !self.tasks[index].completed;
        if !self.patch(id, json!({ "completed": completed })).await {
            return false;
        }
        self.tasks[index].completed = completed;
        true
    }

    /// Replace a task's text. Blank text is ignored.
    pub async fn edit_text(&mut self, id: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        if !self.patch(id, json!({ "text": text })).await {
            return false;
        }
        text.clone_into(&mut self.tasks[index].text);
        true
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        if let Err(e) = self.tables.delete(TODOS_TABLE, &self.row_query(id)).await {
            warn!(error = %e, task_id = %id, "deleting task failed");
            return false;
        }
        self.tasks.retain(|t| t.id != id);
        info!(task_id = %id, "task deleted");
        true
    }

    async fn patch(&self, id: &str, patch: Value) -> bool {
        match self.tables.update(TODOS_TABLE, &self.row_query(id), patch).await {
            // Row filtering hides rows the session cannot see; nothing changed remotely.
            Ok(rows) if rows.is_empty() => {
                warn!(task_id = %id, "update matched no rows");
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, task_id = %id, "updating task failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tests;
