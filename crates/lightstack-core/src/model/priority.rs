// ── Alert priority ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Alert urgency. Lower level = more urgent; `Critical` always wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(into = "u8", try_from = "u8")]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
    Info = 5,
}

impl Priority {
    pub const DEFAULT: Self = Self::Medium;

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Critical),
            2 => Some(Self::High),
            3 => Some(Self::Medium),
            4 => Some(Self::Low),
            5 => Some(Self::Info),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
            Self::Info => 5,
        }
    }

    /// Display name, e.g. `"High"`.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("priority must be 1-5, got {level}"))
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn levels_round_trip() {
        for priority in Priority::iter() {
            assert_eq!(Priority::from_level(priority.level()), Some(priority));
        }
        assert_eq!(Priority::from_level(0), None);
        assert_eq!(Priority::from_level(6), None);
    }

    #[test]
    fn critical_sorts_first() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::Low < Priority::Info);
    }

    #[test]
    fn names_match_levels() {
        assert_eq!(Priority::High.name(), "High");
        assert_eq!(Priority::Info.to_string(), "Info");
        assert_eq!("critical".parse::<Priority>().ok(), Some(Priority::Critical));
    }

    #[test]
    fn serializes_as_level() {
        assert_eq!(serde_json::to_string(&Priority::High).ok().as_deref(), Some("2"));
        assert!(serde_json::from_str::<Priority>("9").is_err());
    }
}
