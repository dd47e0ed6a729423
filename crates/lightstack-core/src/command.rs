// ── Command requests ──
//
// Typed arguments for the alert commands the controller sends. Checked
// locally before anything reaches the wire.

use lightstack_api::protocol::TriggerAlertPayload;

use crate::error::CoreError;
use crate::model::{Alert, LedDuration, LedEffect, LedSettings, Priority};

/// Arguments for `trigger_alert`.
///
/// Unset LED fields fall back to the alert's current settings when the
/// store already holds it, otherwise the server's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerAlert {
    pub key: String,
    /// Priority level 1..=5. Overrides the alert's configured default.
    pub priority: Option<u8>,
    pub color: Option<u8>,
    pub effect: Option<LedEffect>,
    /// Brightness percentage 0..=100.
    pub brightness: Option<u8>,
    pub duration: Option<LedDuration>,
    pub description: Option<String>,
    pub note: Option<String>,
}

impl TriggerAlert {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn priority(mut self, level: u8) -> Self {
        self.priority = Some(level);
        self
    }

    #[must_use]
    pub fn color(mut self, hue: u8) -> Self {
        self.color = Some(hue);
        self
    }

    #[must_use]
    pub fn effect(mut self, effect: LedEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    #[must_use]
    pub fn brightness(mut self, percent: u8) -> Self {
        self.brightness = Some(percent);
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: LedDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_key(&self.key)?;
        if let Some(level) = self.priority {
            if Priority::from_level(level).is_none() {
                return Err(CoreError::validation(format!(
                    "priority must be between 1 and 5, got {level}"
                )));
            }
        }
        if let Some(brightness) = self.brightness {
            if brightness > LedSettings::MAX_BRIGHTNESS {
                return Err(CoreError::validation(format!(
                    "brightness must be between 0 and 100, got {brightness}"
                )));
            }
        }
        Ok(())
    }

    /// Build the wire payload, filling unset fields from `existing`.
    pub fn to_payload(&self, existing: Option<&Alert>) -> TriggerAlertPayload {
        let led = existing.map(|alert| alert.led);
        TriggerAlertPayload {
            alert_key: self.key.trim().to_owned(),
            priority: self
                .priority
                .or_else(|| existing.and_then(|a| a.priority_override).map(Priority::level)),
            note: self.note.clone(),
            led_color: self.color.or(led.map(|l| l.color)),
            led_effect: self.effect.or(led.map(|l| l.effect)).map(LedEffect::code),
            led_brightness: self.brightness.or(led.map(|l| l.brightness)),
            led_duration: self.duration.or(led.map(|l| l.duration)).map(LedDuration::raw),
            description: self
                .description
                .clone()
                .or_else(|| existing.and_then(|a| a.description.clone())),
        }
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), CoreError> {
    if key.trim().is_empty() {
        return Err(CoreError::validation("alert key must not be empty"));
    }
    Ok(())
}
