// ── LED / alert field codec ──
//
// Pure conversions between wire values and the domain model. Decode
// failures on presentation fields (effect, duration) degrade to safe
// defaults inside `decode_alert`; failures on identity or ranking fields
// (key, priority, brightness, color, timestamp) reject the alert.

use chrono::{DateTime, NaiveDateTime, Utc};
use lightstack_api::protocol::{WireAlert, WireEffect};
use thiserror::Error;

use crate::model::{
    Alert, COLOR_MATCH_TOLERANCE, ColorName, DurationUnit, LedDuration, LedEffect, LedSettings,
    PALETTE, Priority,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unknown LED effect: {0}")]
    UnknownEffect(String),

    #[error("Invalid LED duration {0} (expected 1-255)")]
    InvalidDuration(i64),

    #[error("{value} {unit} cannot be encoded as an LED duration")]
    UnrepresentableDuration { value: u32, unit: DurationUnit },

    #[error("Cannot parse duration {0:?} (try 30s, 10m, 2h or indefinite)")]
    UnparsableDuration(String),

    #[error("Priority must be 1-5, got {0}")]
    InvalidPriority(i64),

    #[error("Brightness must be 0-100, got {0}")]
    InvalidBrightness(i64),

    #[error("LED color must be 0-255, got {0}")]
    InvalidColor(i64),

    #[error("Unknown color name: {0}")]
    UnknownColor(String),

    #[error("Alert has no alert_key")]
    MissingKey,

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}

// ── Effect ───────────────────────────────────────────────────────────

pub fn decode_effect(code: i64) -> Result<LedEffect, CodecError> {
    u8::try_from(code)
        .ok()
        .and_then(LedEffect::from_code)
        .ok_or_else(|| CodecError::UnknownEffect(code.to_string()))
}

/// Decode an effect given by name (`"fast_blink"`) or numeric string.
pub fn decode_effect_name(name: &str) -> Result<LedEffect, CodecError> {
    let name = name.trim();
    if let Ok(code) = name.parse::<i64>() {
        return decode_effect(code);
    }
    name.parse::<LedEffect>()
        .map_err(|_| CodecError::UnknownEffect(name.to_owned()))
}

pub fn decode_wire_effect(effect: &WireEffect) -> Result<LedEffect, CodecError> {
    match effect {
        WireEffect::Code(code) => decode_effect(*code),
        WireEffect::Name(name) => decode_effect_name(name),
    }
}

pub fn encode_effect(effect: LedEffect) -> u8 {
    effect.code()
}

// ── Duration ─────────────────────────────────────────────────────────

/// Unpack a raw duration byte. 0 and anything above 255 are invalid.
pub fn decode_duration(raw: i64) -> Result<LedDuration, CodecError> {
    u8::try_from(raw)
        .ok()
        .and_then(LedDuration::from_raw)
        .ok_or(CodecError::InvalidDuration(raw))
}

/// Pack `(value, unit)` into the raw byte of that unit's band.
pub fn encode_duration(value: u32, unit: DurationUnit) -> Result<u8, CodecError> {
    LedDuration::from_parts(value, unit)
        .map(LedDuration::raw)
        .ok_or(CodecError::UnrepresentableDuration { value, unit })
}

/// Parse `"30s"`, `"10 minutes"`, `"2h"` or `"indefinite"`.
pub fn parse_duration(input: &str) -> Result<LedDuration, CodecError> {
    let input = input.trim();
    let unparsable = || CodecError::UnparsableDuration(input.to_owned());

    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let unit: DurationUnit = unit.trim().parse().map_err(|_| unparsable())?;
    let value = if digits.is_empty() {
        0
    } else {
        digits.parse::<u32>().map_err(|_| unparsable())?
    };

    LedDuration::from_parts(value, unit).ok_or(CodecError::UnrepresentableDuration { value, unit })
}

// ── Color ────────────────────────────────────────────────────────────

/// Palette name of the nearest hue, or `Custom` if none is within
/// [`COLOR_MATCH_TOLERANCE`].
pub fn decode_color(code: u8) -> ColorName {
    PALETTE
        .iter()
        .map(|&(hue, name)| (hue.abs_diff(code), name))
        .min_by_key(|&(distance, _)| distance)
        .filter(|&(distance, _)| distance <= COLOR_MATCH_TOLERANCE)
        .map_or(ColorName::Custom, |(_, name)| name)
}

/// Hue for a color given by palette name or number.
pub fn parse_color(input: &str) -> Result<u8, CodecError> {
    let input = input.trim();
    if let Ok(value) = input.parse::<i64>() {
        return u8::try_from(value).map_err(|_| CodecError::InvalidColor(value));
    }
    input
        .parse::<ColorName>()
        .ok()
        .and_then(ColorName::hue)
        .ok_or_else(|| CodecError::UnknownColor(input.to_owned()))
}

// ── Scalars ──────────────────────────────────────────────────────────

pub fn decode_priority(level: i64) -> Result<Priority, CodecError> {
    u8::try_from(level)
        .ok()
        .and_then(Priority::from_level)
        .ok_or(CodecError::InvalidPriority(level))
}

pub fn decode_brightness(value: i64) -> Result<u8, CodecError> {
    u8::try_from(value)
        .ok()
        .filter(|b| *b <= LedSettings::MAX_BRIGHTNESS)
        .ok_or(CodecError::InvalidBrightness(value))
}

pub fn decode_color_code(value: i64) -> Result<u8, CodecError> {
    u8::try_from(value).map_err(|_| CodecError::InvalidColor(value))
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, CodecError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| CodecError::InvalidTimestamp(input.to_owned()))
}

// ── Alert ────────────────────────────────────────────────────────────

/// Decode a wire alert into the domain model.
///
/// `received_at` stands in for a missing `last_triggered_at`.
pub fn decode_alert(wire: WireAlert, received_at: DateTime<Utc>) -> Result<Alert, CodecError> {
    let wire = wire.flatten_config();

    let key = wire.alert_key.trim();
    if key.is_empty() {
        return Err(CodecError::MissingKey);
    }

    // The server reports the effective priority directly; an override is
    // whatever differs from the configured default.
    let base_priority = match wire.default_priority.or(wire.effective_priority) {
        Some(level) => decode_priority(level)?,
        None => Priority::DEFAULT,
    };
    let priority_override = match wire.priority {
        Some(level) => Some(decode_priority(level)?),
        None => match wire.effective_priority {
            Some(level) => Some(decode_priority(level)?).filter(|p| *p != base_priority),
            None => None,
        },
    };

    let defaults = LedSettings::default();
    let color = wire
        .led_color
        .map(decode_color_code)
        .transpose()?
        .unwrap_or(defaults.color);
    let brightness = wire
        .led_brightness
        .map(decode_brightness)
        .transpose()?
        .unwrap_or(defaults.brightness);

    let effect = match wire.led_effect.as_ref().map(decode_wire_effect) {
        None => defaults.effect,
        Some(Ok(effect)) => effect,
        Some(Err(e)) => {
            tracing::warn!(alert_key = key, error = %e, "Unknown LED effect, using solid");
            LedEffect::Solid
        }
    };
    let duration = match wire.led_duration.map(decode_duration) {
        None => defaults.duration,
        Some(Ok(duration)) => duration,
        Some(Err(e)) => {
            tracing::warn!(alert_key = key, error = %e, "Invalid LED duration, using indefinite");
            LedDuration::Indefinite
        }
    };

    let triggered_at = match wire.last_triggered_at.as_deref() {
        Some(ts) => parse_timestamp(ts)?,
        None => received_at,
    };

    Ok(Alert {
        key: key.to_owned(),
        name: wire.name.filter(|n| !n.is_empty()),
        base_priority,
        priority_override,
        led: LedSettings {
            color,
            effect,
            brightness,
            duration,
        },
        description: wire.description.filter(|d| !d.is_empty()),
        triggered_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn wire(value: serde_json::Value) -> WireAlert {
        serde_json::from_value(value).unwrap()
    }

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn duration_boundaries() {
        assert_eq!(decode_duration(1), Ok(LedDuration::Seconds(1)));
        assert_eq!(decode_duration(60), Ok(LedDuration::Seconds(60)));
        assert_eq!(decode_duration(61), Ok(LedDuration::Minutes(1)));
        assert_eq!(decode_duration(120), Ok(LedDuration::Minutes(60)));
        assert_eq!(decode_duration(121), Ok(LedDuration::Hours(1)));
        assert_eq!(decode_duration(254), Ok(LedDuration::Hours(134)));
        assert_eq!(decode_duration(255), Ok(LedDuration::Indefinite));
        assert_eq!(decode_duration(0), Err(CodecError::InvalidDuration(0)));
        assert_eq!(decode_duration(256), Err(CodecError::InvalidDuration(256)));
        assert_eq!(decode_duration(-1), Err(CodecError::InvalidDuration(-1)));
    }

    #[test]
    fn duration_text_parses_per_unit() {
        assert_eq!(parse_duration("30s"), Ok(LedDuration::Seconds(30)));
        assert_eq!(parse_duration("10 minutes"), Ok(LedDuration::Minutes(10)));
        assert_eq!(parse_duration("1 Hour"), Ok(LedDuration::Hours(1)));
        assert_eq!(parse_duration("indefinite"), Ok(LedDuration::Indefinite));
        assert_eq!(
            parse_duration("90s"),
            Err(CodecError::UnrepresentableDuration {
                value: 90,
                unit: DurationUnit::Seconds
            })
        );
        assert!(matches!(
            parse_duration("30"),
            Err(CodecError::UnparsableDuration(_))
        ));
        assert!(matches!(
            parse_duration("soon"),
            Err(CodecError::UnparsableDuration(_))
        ));
    }

    #[test]
    fn duration_round_trips_over_every_valid_raw() {
        for raw in 1..=255_u8 {
            let decoded = decode_duration(i64::from(raw)).unwrap();
            let value = decoded.value().map_or(0, u32::from);
            assert_eq!(encode_duration(value, decoded.unit()), Ok(raw), "raw {raw}");
        }
    }

    #[test]
    fn encode_duration_rejects_out_of_band_values() {
        assert_eq!(
            encode_duration(90, DurationUnit::Seconds),
            Err(CodecError::UnrepresentableDuration {
                value: 90,
                unit: DurationUnit::Seconds
            })
        );
        assert!(encode_duration(0, DurationUnit::Minutes).is_err());
        assert!(encode_duration(135, DurationUnit::Hours).is_err());
        assert_eq!(encode_duration(5, DurationUnit::Minutes), Ok(65));
    }

    #[test]
    fn effect_codes_and_names() {
        assert_eq!(decode_effect(4), Ok(LedEffect::Pulse));
        assert_eq!(decode_effect(255), Ok(LedEffect::ClearEffect));
        assert_eq!(decode_effect(42), Err(CodecError::UnknownEffect("42".into())));
        assert_eq!(decode_effect(-3), Err(CodecError::UnknownEffect("-3".into())));
        assert_eq!(decode_effect_name("fast_siren"), Ok(LedEffect::FastSiren));
        assert_eq!(decode_effect_name("2"), Ok(LedEffect::FastBlink));
        assert!(decode_effect_name("disco").is_err());
    }

    #[test]
    fn color_names_match_palette_within_tolerance() {
        assert_eq!(decode_color(0), ColorName::Red);
        assert_eq!(decode_color(10), ColorName::Red);
        assert_eq!(decode_color(11), ColorName::Orange);
        assert_eq!(decode_color(170), ColorName::Blue);
        assert_eq!(decode_color(245), ColorName::White);
        assert_eq!(decode_color(60), ColorName::Custom);
        assert_eq!(decode_color(223), ColorName::Custom);
    }

    #[test]
    fn parse_color_accepts_names_and_numbers() {
        assert_eq!(parse_color("red"), Ok(0));
        assert_eq!(parse_color("Blue"), Ok(170));
        assert_eq!(parse_color("99"), Ok(99));
        assert_eq!(parse_color("300"), Err(CodecError::InvalidColor(300)));
        assert!(parse_color("custom").is_err());
    }

    #[test]
    fn decode_full_alert() {
        let alert = decode_alert(
            wire(json!({
                "alert_key": "garage_door_open",
                "is_active": true,
                "effective_priority": 2,
                "default_priority": 2,
                "last_triggered_at": "2026-10-19T08:30:00Z",
                "name": "Garage Door Open",
                "description": "Left open",
                "led_color": 21,
                "led_effect": "pulse",
                "led_brightness": 80,
                "led_duration": 65
            })),
            received(),
        )
        .unwrap();

        assert_eq!(alert.key, "garage_door_open");
        assert_eq!(alert.name.as_deref(), Some("Garage Door Open"));
        assert_eq!(alert.effective_priority(), Priority::High);
        assert_eq!(alert.priority_override, None);
        assert_eq!(
            alert.led,
            LedSettings {
                color: 21,
                effect: LedEffect::Pulse,
                brightness: 80,
                duration: LedDuration::Minutes(5),
            }
        );
        assert_eq!(
            alert.triggered_at,
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn explicit_priority_is_an_override() {
        let alert = decode_alert(
            wire(json!({"alert_key": "k", "default_priority": 4, "priority": 1, "effective_priority": 1})),
            received(),
        )
        .unwrap();
        assert_eq!(alert.base_priority, Priority::Low);
        assert_eq!(alert.priority_override, Some(Priority::Critical));
    }

    #[test]
    fn effective_priority_differing_from_default_becomes_override() {
        let alert = decode_alert(
            wire(json!({"alert_key": "k", "default_priority": 3, "effective_priority": 1})),
            received(),
        )
        .unwrap();
        assert_eq!(alert.effective_priority(), Priority::Critical);
    }

    #[test]
    fn nested_config_is_honored() {
        let alert = decode_alert(
            wire(json!({
                "alert_key": "water_leak",
                "led_color": 170,
                "config": {"led_color": 0, "default_priority": 1, "led_effect": 18}
            })),
            received(),
        )
        .unwrap();
        assert_eq!(alert.led.color, 0);
        assert_eq!(alert.led.effect, LedEffect::FastSiren);
        assert_eq!(alert.base_priority, Priority::Critical);
    }

    #[test]
    fn missing_fields_use_defaults_and_receive_time() {
        let alert = decode_alert(wire(json!({"alert_key": "k"})), received()).unwrap();
        assert_eq!(alert.base_priority, Priority::Medium);
        assert_eq!(alert.led, LedSettings::default());
        assert_eq!(alert.triggered_at, received());
    }

    #[test]
    fn bad_presentation_fields_degrade() {
        let alert = decode_alert(
            wire(json!({"alert_key": "k", "led_effect": 99, "led_duration": 0})),
            received(),
        )
        .unwrap();
        assert_eq!(alert.led.effect, LedEffect::Solid);
        assert_eq!(alert.led.duration, LedDuration::Indefinite);
    }

    #[test]
    fn bad_identity_fields_reject() {
        assert_eq!(
            decode_alert(wire(json!({"alert_key": "  "})), received()),
            Err(CodecError::MissingKey)
        );
        assert_eq!(
            decode_alert(wire(json!({"alert_key": "k", "priority": 7})), received()),
            Err(CodecError::InvalidPriority(7))
        );
        assert_eq!(
            decode_alert(wire(json!({"alert_key": "k", "led_brightness": 101})), received()),
            Err(CodecError::InvalidBrightness(101))
        );
        assert!(matches!(
            decode_alert(
                wire(json!({"alert_key": "k", "last_triggered_at": "yesterday"})),
                received()
            ),
            Err(CodecError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn naive_timestamps_are_utc() {
        assert_eq!(
            parse_timestamp("2026-10-19T08:30:00.250").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }
}
