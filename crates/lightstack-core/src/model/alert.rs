// ── Alert domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::led::LedSettings;
use super::priority::Priority;

/// One active alert condition, keyed by `key`.
///
/// Presence in the [`AlertStore`](crate::store::AlertStore) means the
/// server considers the alert active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub key: String,
    /// Display name configured on the server, if any.
    pub name: Option<String>,
    pub base_priority: Priority,
    /// Priority given at trigger time, overriding `base_priority`.
    pub priority_override: Option<Priority>,
    pub led: LedSettings,
    pub description: Option<String>,
    /// Most recent (re-)trigger time.
    pub triggered_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(key: impl Into<String>, base_priority: Priority, triggered_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            name: None,
            base_priority,
            priority_override: None,
            led: LedSettings::default(),
            description: None,
            triggered_at,
        }
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority_override.unwrap_or(self.base_priority)
    }

    /// Name if set, else the key.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}
