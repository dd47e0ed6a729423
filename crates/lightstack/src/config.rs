//! CLI configuration: thin wrapper around `lightstack_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--profile, --host, --port, --timeout).

use lightstack_config::ConfigError;
use lightstack_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use lightstack_config::{Config, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| lightstack_config::DEFAULT_PROFILE.into())
}

/// The profile selected by flags and config, with flag overrides applied.
pub fn effective_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let (name, mut profile) = lightstack_config::resolve_profile(cfg, global.profile.as_deref())
        .map_err(|err| match err {
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            },
            other => CliError::Config(other),
        })?;

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok((name, profile))
}

/// Build a validated `ControllerConfig` from the config file, profile,
/// and CLI overrides.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config()?;
    let (name, profile) = effective_profile(global, &cfg)?;
    Ok(lightstack_config::profile_to_controller_config(
        &profile,
        &cfg.defaults,
        &name,
    )?)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
