// ── Priority resolution ──
//
// Picks the single alert to display from the store:
// lowest effective priority, then most recent trigger, then smallest key.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::decode_color;
use crate::model::Alert;
use crate::store::AlertStore;

/// State value shown when nothing is active.
pub const ALL_CLEAR: &str = "All Clear";

/// Display order: most urgent first.
pub fn rank(a: &Alert, b: &Alert) -> Ordering {
    a.effective_priority()
        .cmp(&b.effective_priority())
        .then_with(|| b.triggered_at.cmp(&a.triggered_at))
        .then_with(|| a.key.cmp(&b.key))
}

/// All alerts in display order.
pub fn ordered(store: &AlertStore) -> Vec<Arc<Alert>> {
    let mut alerts: Vec<Arc<Alert>> = store.iter().cloned().collect();
    alerts.sort_by(|a, b| rank(a, b));
    alerts
}

/// The alert that should be displayed, if any.
pub fn select(store: &AlertStore) -> Option<&Arc<Alert>> {
    store.iter().min_by(|a, b| rank(a, b))
}

pub fn resolve(store: &AlertStore) -> EffectiveAlertSnapshot {
    EffectiveAlertSnapshot {
        is_all_clear: store.is_empty(),
        active_count: store.len(),
        current: select(store).map(|alert| AlertAttributes::from_alert(alert)),
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────

/// The resolved view of the store. Replaced wholesale on every change.
///
/// Serializes flat with the attribute names automations key off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveAlertSnapshot {
    pub is_all_clear: bool,
    pub active_count: usize,
    #[serde(flatten)]
    pub current: Option<AlertAttributes>,
}

impl EffectiveAlertSnapshot {
    pub fn all_clear() -> Self {
        Self {
            is_all_clear: true,
            active_count: 0,
            current: None,
        }
    }

    /// Sensor state: the current alert's name, else its key, else
    /// `"All Clear"`.
    pub fn state_value(&self) -> &str {
        match &self.current {
            Some(current) => current.name.as_deref().unwrap_or(&current.alert_key),
            None => ALL_CLEAR,
        }
    }

    /// Binary-sensor state: on while any alert is active.
    pub fn is_alert_active(&self) -> bool {
        !self.is_all_clear
    }
}

impl Default for EffectiveAlertSnapshot {
    fn default() -> Self {
        Self::all_clear()
    }
}

/// Attributes of the resolved alert with human-readable projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertAttributes {
    pub alert_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub effective_priority: u8,
    pub priority_name: &'static str,
    pub led_color: u8,
    pub led_color_name: &'static str,
    pub led_effect: u8,
    pub led_effect_name: &'static str,
    pub led_brightness: u8,
    pub led_duration: u8,
    pub led_duration_name: String,
    pub last_triggered: DateTime<Utc>,
    pub description: Option<String>,
}

impl AlertAttributes {
    pub fn from_alert(alert: &Alert) -> Self {
        let priority = alert.effective_priority();
        Self {
            alert_key: alert.key.clone(),
            name: alert.name.clone(),
            effective_priority: priority.level(),
            priority_name: priority.name(),
            led_color: alert.led.color,
            led_color_name: decode_color(alert.led.color).name(),
            led_effect: alert.led.effect.code(),
            led_effect_name: alert.led.effect.name(),
            led_brightness: alert.led.brightness,
            led_duration: alert.led.duration.raw(),
            led_duration_name: alert.led.duration.to_string(),
            last_triggered: alert.triggered_at,
            description: alert.description.clone(),
        }
    }
}
