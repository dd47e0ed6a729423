//! Alert command handlers: status, list, trigger, clear.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use lightstack_core::codec::{decode_effect_name, parse_color, parse_duration};
use lightstack_core::{
    Alert, AlertAttributes, AlertStackController, ControllerConfig, CoreError,
    EffectiveAlertSnapshot, Priority, TriggerAlert,
};

use crate::cli::{ClearAllArgs, ClearArgs, GlobalOpts, TriggerArgs};
use crate::error::CliError;
use crate::output;

use super::util::or_dash;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Effect")]
    effect: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Triggered")]
    triggered: String,
}

impl AlertRow {
    fn new(a: &AlertAttributes, color: bool) -> Self {
        let priority = Priority::from_level(a.effective_priority)
            .map_or_else(|| a.priority_name.to_owned(), |p| output::paint_priority(p, color));
        Self {
            key: a.alert_key.clone(),
            name: a.name.clone().unwrap_or_default(),
            priority,
            color: format!("{} ({})", a.led_color_name, a.led_color),
            effect: a.led_effect_name.to_owned(),
            brightness: format!("{}%", a.led_brightness),
            duration: a.led_duration_name.clone(),
            triggered: a.last_triggered.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusView {
    endpoint: String,
    server_version: Option<String>,
    state: String,
    is_alert_active: bool,
    #[serde(flatten)]
    effective: EffectiveAlertSnapshot,
}

fn status_detail(view: &StatusView) -> String {
    let mut lines = vec![
        format!("Server:     {}", view.endpoint),
        format!("Version:    {}", or_dash(view.server_version.as_deref())),
        format!("State:      {}", view.state),
        format!("Active:     {}", view.effective.active_count),
    ];
    if let Some(current) = &view.effective.current {
        lines.push(format!("Priority:   {}", current.priority_name));
        lines.push(format!(
            "LED:        {} ({}), {}, {}%, {}",
            current.led_color_name,
            current.led_color,
            current.led_effect_name,
            current.led_brightness,
            current.led_duration_name
        ));
        lines.push(format!(
            "Since:      {}",
            current.last_triggered.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(description) = &current.description {
            lines.push(format!("Details:    {description}"));
        }
    }
    lines.join("\n")
}

pub async fn status(config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let endpoint = config.ws_url()?.to_string();
    let (effective, server_version) =
        AlertStackController::oneshot(config, |controller| async move {
            Ok((controller.effective(), controller.server_version()))
        })
        .await?;

    let view = StatusView {
        endpoint,
        server_version,
        state: effective.state_value().to_owned(),
        is_alert_active: effective.is_alert_active(),
        effective,
    };
    let out = output::render_single(&global.output, &view, status_detail, |v| v.state.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── List ────────────────────────────────────────────────────────────

pub async fn list(config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let alerts: Vec<Arc<Alert>> =
        AlertStackController::oneshot(config, |controller| async move {
            Ok(controller.active_alerts())
        })
        .await?;

    let attributes: Vec<AlertAttributes> = alerts
        .iter()
        .map(|alert| AlertAttributes::from_alert(alert))
        .collect();
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &attributes,
        |a| AlertRow::new(a, color),
        |a| a.alert_key.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Trigger ─────────────────────────────────────────────────────────

fn build_trigger(args: TriggerArgs) -> Result<TriggerAlert, CliError> {
    let mut request = TriggerAlert::new(args.key);
    request.priority = args.priority;
    request.brightness = args.brightness;
    request.description = args.description;
    request.note = args.note;
    if let Some(color) = args.color.as_deref() {
        request.color = Some(parse_color(color)?);
    }
    if let Some(effect) = args.effect.as_deref() {
        request.effect = Some(decode_effect_name(effect)?);
    }
    if let Some(duration) = args.duration.as_deref() {
        request.duration = Some(parse_duration(duration)?);
    }
    request.validate()?;
    Ok(request)
}

pub async fn trigger(
    config: ControllerConfig,
    args: TriggerArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = build_trigger(args)?;
    let key = request.key.trim().to_owned();

    AlertStackController::oneshot(config, |controller| async move {
        controller.trigger_alert(request).await
    })
    .await?;

    output::print_output(&format!("Triggered {key}"), global.quiet);
    Ok(())
}

// ── Clear ───────────────────────────────────────────────────────────

pub async fn clear(
    config: ControllerConfig,
    args: ClearArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let key = args.key.trim().to_owned();
    let result = AlertStackController::oneshot(config, |controller| {
        let key = key.clone();
        async move { controller.clear_alert(&key, args.note).await }
    })
    .await;

    match result {
        Ok(()) => {
            output::print_output(&format!("Cleared {key}"), global.quiet);
            Ok(())
        }
        Err(CoreError::Rejected { code, .. }) if code == "ALERT_NOT_FOUND" => {
            Err(CliError::AlertNotFound { key })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn clear_all(
    config: ControllerConfig,
    args: ClearAllArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    AlertStackController::oneshot(config, |controller| async move {
        controller.clear_all_alerts(args.note).await
    })
    .await?;

    output::print_output("Cleared all alerts", global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lightstack_core::{LedDuration, LedEffect};

    use super::*;

    fn args(key: &str) -> TriggerArgs {
        TriggerArgs {
            key: key.into(),
            priority: None,
            color: None,
            effect: None,
            brightness: None,
            duration: None,
            description: None,
            note: None,
        }
    }

    #[test]
    fn trigger_arguments_are_decoded() {
        let request = build_trigger(TriggerArgs {
            priority: Some(2),
            color: Some("orange".into()),
            effect: Some("pulse".into()),
            duration: Some("10m".into()),
            ..args("garage_door_open")
        })
        .unwrap();

        assert_eq!(request.priority, Some(2));
        assert_eq!(request.color, Some(21));
        assert_eq!(request.effect, Some(LedEffect::Pulse));
        assert_eq!(request.duration, Some(LedDuration::Minutes(10)));
    }

    #[test]
    fn bad_trigger_arguments_are_usage_errors() {
        let err = build_trigger(TriggerArgs {
            color: Some("mauve".into()),
            ..args("a")
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));

        assert!(build_trigger(args("  ")).is_err());
    }
}
