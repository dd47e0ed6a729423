//! `watch`: stream availability and effective-state changes until Ctrl-C.

use std::sync::Arc;

use serde::Serialize;

use lightstack_core::{
    AlertStackController, ConnectionState, ControllerConfig, Priority, StackSnapshot,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util::state_label;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent<'a> {
    Availability { state: String, connected: bool },
    Snapshot(&'a StackSnapshot),
}

/// Whether a new snapshot is worth printing.
///
/// Without `--all`, only changes to the effective view count.
fn should_report(previous: &StackSnapshot, next: &StackSnapshot, all: bool) -> bool {
    all || previous.effective != next.effective
}

fn snapshot_line(snapshot: &StackSnapshot, color: bool) -> String {
    match &snapshot.effective.current {
        None => "all clear".into(),
        Some(current) => {
            let priority = Priority::from_level(current.effective_priority)
                .map_or_else(
                    || current.priority_name.to_owned(),
                    |p| output::paint_priority(p, color),
                );
            format!(
                "{} [{}] {} {} ({} active)",
                current.alert_key,
                priority,
                current.led_color_name,
                current.led_effect_name,
                snapshot.effective.active_count
            )
        }
    }
}

fn emit(event: &WatchEvent<'_>, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true)?,
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(event)?),
        OutputFormat::Table | OutputFormat::Plain => match event {
            WatchEvent::Availability { state, connected } => {
                output::paint_state(state, *connected, color)
            }
            WatchEvent::Snapshot(snapshot) => snapshot_line(snapshot, color),
        },
    };
    output::print_output(&line, global.quiet);
    Ok(())
}

fn availability(state: ConnectionState) -> WatchEvent<'static> {
    WatchEvent::Availability {
        state: state_label(state),
        connected: state.is_connected(),
    }
}

pub async fn handle(
    config: ControllerConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let controller = AlertStackController::new(config)?;
    let mut states = controller.watch_availability();
    let mut snapshots = controller.snapshots();
    controller.connect().await?;

    emit(&availability(*states.borrow_and_update()), global, color)?;
    let mut last: Arc<StackSnapshot> = snapshots.current().clone();

    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *states.borrow_and_update();
                tracing::debug!(?state, "connection state changed");
                if let Err(e) = emit(&availability(state), global, color) {
                    break Err(e);
                }
            }
            next = snapshots.changed() => {
                let Some(next) = next else { break Ok(()) };
                if should_report(&last, &next, args.all) {
                    if let Err(e) = emit(&WatchEvent::Snapshot(&next), global, color) {
                        break Err(e);
                    }
                }
                last = next;
            }
        }
    };

    controller.disconnect().await;
    result
}
