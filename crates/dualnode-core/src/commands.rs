//! Per-station generated-code command history.
//!
//! Every generated command is recorded here with its lifecycle status
//! (`generated` → `executed` or `error`). Each station keeps a bounded,
//! newest-first history.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CommandsConfig;
use crate::types::{Command, CommandStatus};

/// Bounded command histories keyed by station identifier.
pub struct CommandLog {
    entries: RwLock<HashMap<String, Vec<Command>>>,
    capacity: usize,
}

impl CommandLog {
    /// Create an empty log.
    #[must_use]
    pub fn new(config: &CommandsConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: config.history_capacity,
        }
    }

    /// Record a freshly generated command for a station.
    pub async fn push(&self, mac: &str, command: Command) {
        let mut entries = self.entries.write().await;
        let history = entries.entry(mac.to_string()).or_default();
        history.insert(0, command);
        history.truncate(self.capacity);
    }

    /// Mark a command as executed.
    ///
    /// Unknown command identifiers are ignored; the dispatch already
    /// succeeded on the device and the history is advisory.
    pub async fn mark_executed(&self, mac: &str, id: Uuid) {
        let mut entries = self.entries.write().await;
        if let Some(cmd) = entries
            .get_mut(mac)
            .and_then(|h| h.iter_mut().find(|c| c.id == id))
        {
            cmd.status = CommandStatus::Executed;
            cmd.executed_at = Some(Utc::now());
        }
    }

    /// Mark a command as failed, storing the error text.
    pub async fn mark_error(&self, mac: &str, id: Uuid, error: impl Into<String>) {
        let mut entries = self.entries.write().await;
        if let Some(cmd) = entries
            .get_mut(mac)
            .and_then(|h| h.iter_mut().find(|c| c.id == id))
        {
            cmd.status = CommandStatus::Error;
            cmd.error = Some(error.into());
        }
    }

    /// Command history for a station, newest first.
    pub async fn history(&self, mac: &str) -> Vec<Command> {
        self.entries.read().await.get(mac).cloned().unwrap_or_default()
    }

    /// Drop a station's command history.
    pub async fn forget(&self, mac: &str) {
        self.entries.write().await.remove(mac);
    }
}
