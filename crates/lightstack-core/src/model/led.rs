// ── LED presentation types ──
//
// Inovelli switches take color as a hue byte (0-255), an effect code,
// brightness 0-100, and a duration byte packing three units.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ── LedEffect ────────────────────────────────────────────────────────

/// LED animation, one of the 21 effects the switch firmware knows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LedEffect {
    Off,
    Solid,
    FastBlink,
    SlowBlink,
    Pulse,
    Chase,
    OpenClose,
    SmallToBig,
    Aurora,
    SlowFalling,
    MediumFalling,
    FastFalling,
    SlowRising,
    MediumRising,
    FastRising,
    MediumBlink,
    SlowChase,
    FastChase,
    FastSiren,
    SlowSiren,
    ClearEffect,
}

impl LedEffect {
    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Solid => 1,
            Self::FastBlink => 2,
            Self::SlowBlink => 3,
            Self::Pulse => 4,
            Self::Chase => 5,
            Self::OpenClose => 6,
            Self::SmallToBig => 7,
            Self::Aurora => 8,
            Self::SlowFalling => 9,
            Self::MediumFalling => 10,
            Self::FastFalling => 11,
            Self::SlowRising => 12,
            Self::MediumRising => 13,
            Self::FastRising => 14,
            Self::MediumBlink => 15,
            Self::SlowChase => 16,
            Self::FastChase => 17,
            Self::FastSiren => 18,
            Self::SlowSiren => 19,
            Self::ClearEffect => 255,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let effect = match code {
            0 => Self::Off,
            1 => Self::Solid,
            2 => Self::FastBlink,
            3 => Self::SlowBlink,
            4 => Self::Pulse,
            5 => Self::Chase,
            6 => Self::OpenClose,
            7 => Self::SmallToBig,
            8 => Self::Aurora,
            9 => Self::SlowFalling,
            10 => Self::MediumFalling,
            11 => Self::FastFalling,
            12 => Self::SlowRising,
            13 => Self::MediumRising,
            14 => Self::FastRising,
            15 => Self::MediumBlink,
            16 => Self::SlowChase,
            17 => Self::FastChase,
            18 => Self::FastSiren,
            19 => Self::SlowSiren,
            255 => Self::ClearEffect,
            _ => return None,
        };
        Some(effect)
    }

    /// Wire name, e.g. `"fast_blink"`.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

// ── LedDuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DurationUnit {
    #[strum(to_string = "seconds", serialize = "second", serialize = "s")]
    Seconds,
    #[strum(to_string = "minutes", serialize = "minute", serialize = "m")]
    Minutes,
    #[strum(to_string = "hours", serialize = "hour", serialize = "h")]
    Hours,
    Indefinite,
}

/// How long the LED effect runs.
///
/// Packed into one byte on the wire:
///
/// | raw       | meaning              |
/// |-----------|----------------------|
/// | 1-60      | 1-60 seconds         |
/// | 61-120    | 1-60 minutes         |
/// | 121-254   | 1-134 hours          |
/// | 255       | until cleared        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LedDuration {
    Seconds(u8),
    Minutes(u8),
    Hours(u8),
    #[default]
    Indefinite,
}

impl LedDuration {
    pub const MAX_SECONDS: u8 = 60;
    pub const MAX_MINUTES: u8 = 60;
    pub const MAX_HOURS: u8 = 134;
    pub const INDEFINITE_RAW: u8 = 255;

    /// Packed wire byte.
    pub fn raw(self) -> u8 {
        match self {
            Self::Seconds(s) => s,
            Self::Minutes(m) => 60 + m,
            Self::Hours(h) => 120 + h,
            Self::Indefinite => Self::INDEFINITE_RAW,
        }
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => None,
            1..=60 => Some(Self::Seconds(raw)),
            61..=120 => Some(Self::Minutes(raw - 60)),
            121..=254 => Some(Self::Hours(raw - 120)),
            255 => Some(Self::Indefinite),
        }
    }

    /// Build from a value in a unit, without re-banding.
    ///
    /// `None` if the value is outside the unit's band (or non-zero for
    /// `Indefinite`).
    pub fn from_parts(value: u32, unit: DurationUnit) -> Option<Self> {
        let in_band = |max: u8| {
            u8::try_from(value)
                .ok()
                .filter(|v| (1..=max).contains(v))
        };
        match unit {
            DurationUnit::Seconds => in_band(Self::MAX_SECONDS).map(Self::Seconds),
            DurationUnit::Minutes => in_band(Self::MAX_MINUTES).map(Self::Minutes),
            DurationUnit::Hours => in_band(Self::MAX_HOURS).map(Self::Hours),
            DurationUnit::Indefinite => (value == 0).then_some(Self::Indefinite),
        }
    }

    pub fn unit(self) -> DurationUnit {
        match self {
            Self::Seconds(_) => DurationUnit::Seconds,
            Self::Minutes(_) => DurationUnit::Minutes,
            Self::Hours(_) => DurationUnit::Hours,
            Self::Indefinite => DurationUnit::Indefinite,
        }
    }

    /// Numeric value in [`unit`](Self::unit); `None` when indefinite.
    pub fn value(self) -> Option<u8> {
        match self {
            Self::Seconds(v) | Self::Minutes(v) | Self::Hours(v) => Some(v),
            Self::Indefinite => None,
        }
    }
}

impl fmt::Display for LedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, singular) = match *self {
            Self::Seconds(v) => (v, "second"),
            Self::Minutes(v) => (v, "minute"),
            Self::Hours(v) => (v, "hour"),
            Self::Indefinite => return f.write_str("Indefinite"),
        };
        if value == 1 {
            write!(f, "1 {singular}")
        } else {
            write!(f, "{value} {singular}s")
        }
    }
}

impl From<LedDuration> for u8 {
    fn from(duration: LedDuration) -> Self {
        duration.raw()
    }
}

impl TryFrom<u8> for LedDuration {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| format!("invalid LED duration {raw}"))
    }
}

// ── Color ────────────────────────────────────────────────────────────

/// Named hue on the Inovelli color wheel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ColorName {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    Pink,
    White,
    /// Not within reach of any palette entry.
    Custom,
}

/// Palette hues, ascending.
pub const PALETTE: [(u8, ColorName); 9] = [
    (0, ColorName::Red),
    (21, ColorName::Orange),
    (42, ColorName::Yellow),
    (85, ColorName::Green),
    (127, ColorName::Cyan),
    (170, ColorName::Blue),
    (212, ColorName::Purple),
    (234, ColorName::Pink),
    (255, ColorName::White),
];

/// Max hue distance for a value to take a palette entry's name.
pub const COLOR_MATCH_TOLERANCE: u8 = 10;

impl ColorName {
    /// Palette hue, `None` for `Custom`.
    pub fn hue(self) -> Option<u8> {
        PALETTE
            .iter()
            .find(|(_, name)| *name == self)
            .map(|(hue, _)| *hue)
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// LED settings carried by every alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedSettings {
    pub color: u8,
    pub effect: LedEffect,
    /// Percent, 0-100.
    pub brightness: u8,
    pub duration: LedDuration,
}

impl LedSettings {
    pub const MAX_BRIGHTNESS: u8 = 100;
}

impl Default for LedSettings {
    fn default() -> Self {
        Self {
            color: 170,
            effect: LedEffect::Solid,
            brightness: Self::MAX_BRIGHTNESS,
            duration: LedDuration::Indefinite,
        }
    }
}
