// ── Domain model ──

pub mod alert;
pub mod led;
pub mod priority;

pub use alert::Alert;
pub use led::{COLOR_MATCH_TOLERANCE, ColorName, DurationUnit, LedDuration, LedEffect, LedSettings, PALETTE};
pub use priority::Priority;
