// ── Alert store ──
//
// The client's mirror of the server's active alert set. Mutated only by
// applying decoded `AlertEvent`s; every apply is all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Alert;

/// A decoded mutation from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// Insert or fully replace the alert at its key.
    Upsert(Alert),
    /// Delete by key. Absent keys are a no-op.
    Remove(String),
    ClearAll,
    /// Replace the whole store.
    Resync(Vec<Alert>),
}

#[derive(Debug, Clone, Default)]
pub struct AlertStore {
    alerts: HashMap<String, Arc<Alert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the resulting number of alerts.
    pub fn apply(&mut self, event: AlertEvent) -> usize {
        match event {
            AlertEvent::Upsert(alert) => {
                self.alerts.insert(alert.key.clone(), Arc::new(alert));
            }
            AlertEvent::Remove(key) => {
                self.alerts.remove(&key);
            }
            AlertEvent::ClearAll => self.alerts.clear(),
            AlertEvent::Resync(alerts) => {
                // Later duplicates of a key win, same as a sequence of upserts.
                self.alerts = alerts
                    .into_iter()
                    .map(|alert| (alert.key.clone(), Arc::new(alert)))
                    .collect();
            }
        }
        self.alerts.len()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Alert>> {
        self.alerts.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.alerts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Alert>> {
        self.alerts.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.alerts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::Priority;

    fn alert(key: &str) -> Alert {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Alert::new(key, Priority::Medium, at)
    }

    fn keys(store: &AlertStore) -> Vec<String> {
        let mut keys: Vec<String> = store.keys().map(str::to_owned).collect();
        keys.sort();
        keys
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let mut store = AlertStore::new();
        assert_eq!(store.apply(AlertEvent::Upsert(alert("a"))), 1);

        let mut updated = alert("a");
        updated.description = Some("second trigger".into());
        assert_eq!(store.apply(AlertEvent::Upsert(updated)), 1);
        assert_eq!(
            store.get("a").and_then(|a| a.description.as_deref()),
            Some("second trigger")
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = AlertStore::new();
        store.apply(AlertEvent::Upsert(alert("a")));
        store.apply(AlertEvent::Upsert(alert("b")));

        assert_eq!(store.apply(AlertEvent::Remove("a".into())), 1);
        let once = keys(&store);
        assert_eq!(store.apply(AlertEvent::Remove("a".into())), 1);
        assert_eq!(keys(&store), once);
    }

    #[test]
    fn clear_all_on_empty_store_is_noop() {
        let mut store = AlertStore::new();
        assert_eq!(store.apply(AlertEvent::ClearAll), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn resync_replaces_never_merges() {
        let mut store = AlertStore::new();
        store.apply(AlertEvent::Upsert(alert("a")));
        store.apply(AlertEvent::Upsert(alert("b")));

        assert_eq!(store.apply(AlertEvent::Resync(vec![alert("c")])), 1);
        assert_eq!(keys(&store), vec!["c".to_owned()]);
        assert!(!store.contains("a"));
    }

    #[test]
    fn resync_with_empty_list_clears() {
        let mut store = AlertStore::new();
        store.apply(AlertEvent::Upsert(alert("a")));
        assert_eq!(store.apply(AlertEvent::Resync(Vec::new())), 0);
    }
}
