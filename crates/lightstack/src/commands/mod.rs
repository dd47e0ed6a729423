//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod decode;
pub mod util;
pub mod watch;

use lightstack_core::ControllerConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => alerts::status(config, global).await,
        Command::Alerts => alerts::list(config, global).await,
        Command::Trigger(args) => alerts::trigger(config, args, global).await,
        Command::Clear(args) => alerts::clear(config, args, global).await,
        Command::ClearAll(args) => alerts::clear_all(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Decode(_) | Command::Config(_) | Command::Completions(_) => Err(
            CliError::Internal("local commands are handled before dispatch".into()),
        ),
    }
}
