use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::prefs::{PreferenceStore, StoreError};

pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// One logged event: what happened, when, and an optional reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: String, // RFC 3339
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl ActivityEntry {
    pub fn new(kind: &str, details: &str, value: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            details: details.to_string(),
            value,
        }
    }
}

/// Append-only history with a hard cap. Oldest entries fall off first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Vec<ActivityEntry>,
    max_entries: usize,
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Read the log back through the store. A file whose shape no longer
    /// deserializes starts the log empty rather than failing.
    pub fn load(store: &PreferenceStore, filename: &str, max_entries: usize) -> Self {
        let raw = store.load(filename, &Value::Array(Vec::new()));
        let entries: Vec<ActivityEntry> = match serde_json::from_value(raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("activity log {filename} had an unexpected shape, starting empty: {e}");
                Vec::new()
            }
        };
        let mut log = Self {
            entries,
            max_entries,
        };
        log.enforce_cap();
        log
    }

    pub fn save(&self, store: &PreferenceStore, filename: &str) -> Result<(), StoreError> {
        let raw = serde_json::to_value(&self.entries)?;
        store.save(filename, &raw)
    }

    pub fn push(&mut self, entry: ActivityEntry) {
        self.entries.push(entry);
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if self.entries.len() > self.max_entries {
            let removed = self.entries.len() - self.max_entries;
            self.entries.drain(..removed);
            warn!("activity log at capacity, removed {removed} oldest entries");
        }
    }

    /// Most recent first, optionally filtered by kind, at most `limit`.
    pub fn recent(&self, kind: Option<&str>, limit: usize) -> Vec<&ActivityEntry> {
        self.entries
            .iter()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .rev()
            .take(limit)
            .collect()
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
