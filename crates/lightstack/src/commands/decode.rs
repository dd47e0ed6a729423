//! Offline LED value decoding. Never touches the network.

use serde::Serialize;

use lightstack_core::codec::{
    decode_color, decode_duration, decode_effect_name, parse_color, parse_duration,
};
use lightstack_core::{DurationUnit, LedDuration};

use crate::cli::{DecodeArgs, DecodeCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DurationView {
    raw: u8,
    name: String,
    unit: DurationUnit,
    value: Option<u8>,
}

impl From<LedDuration> for DurationView {
    fn from(duration: LedDuration) -> Self {
        Self {
            raw: duration.raw(),
            name: duration.to_string(),
            unit: duration.unit(),
            value: duration.value(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EffectView {
    code: u8,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct ColorView {
    hue: u8,
    name: &'static str,
}

/// Bare numbers are raw duration bytes; anything else is text like `10m`.
fn lookup_duration(value: &str) -> Result<DurationView, CliError> {
    let value = value.trim();
    let duration = match value.parse::<i64>() {
        Ok(raw) => decode_duration(raw)?,
        Err(_) => parse_duration(value)?,
    };
    Ok(duration.into())
}

fn lookup_effect(value: &str) -> Result<EffectView, CliError> {
    let effect = decode_effect_name(value)?;
    Ok(EffectView {
        code: effect.code(),
        name: effect.name(),
    })
}

fn lookup_color(value: &str) -> Result<ColorView, CliError> {
    let hue = parse_color(value)?;
    Ok(ColorView {
        hue,
        name: decode_color(hue).name(),
    })
}

pub fn handle(args: DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        DecodeCommand::Duration { value } => {
            let view = lookup_duration(&value)?;
            output::render_single(
                &global.output,
                &view,
                |v| format!("{} (raw {})", v.name, v.raw),
                |v| v.raw.to_string(),
            )?
        }
        DecodeCommand::Effect { value } => {
            let view = lookup_effect(&value)?;
            output::render_single(
                &global.output,
                &view,
                |v| format!("{} (code {})", v.name, v.code),
                |v| v.code.to_string(),
            )?
        }
        DecodeCommand::Color { value } => {
            let view = lookup_color(&value)?;
            output::render_single(
                &global.output,
                &view,
                |v| format!("{} (hue {})", v.name, v.hue),
                |v| v.hue.to_string(),
            )?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
