//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use lightstack_config::{DEFAULT_PROFILE, Defaults, profile_to_controller_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ShowView<'a> {
    path: String,
    profile: String,
    endpoint: String,
    #[serde(flatten)]
    settings: &'a Profile,
    defaults: &'a Defaults,
}

#[derive(Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Default")]
    default: String,
}

/// Profile written by `config init`: flag overrides on top of the existing
/// entry (when forced) or the built-in defaults.
fn init_profile(global: &GlobalOpts, existing: Option<&Profile>) -> Profile {
    let mut profile = existing.cloned().unwrap_or_default();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    profile
}

fn profile_rows(cfg: &Config) -> Vec<ProfileRow> {
    let default = cfg.default_profile.as_deref().unwrap_or(DEFAULT_PROFILE);
    cfg.profiles
        .iter()
        .map(|(name, profile)| ProfileRow {
            name: name.clone(),
            host: profile.host.clone(),
            port: profile.port,
            default: if name == default { "*".into() } else { String::new() },
        })
        .collect()
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let mut cfg = config::load_config()?;
            let name = config::active_profile_name(global, &cfg);

            let existing = cfg.profiles.get(&name);
            if existing.is_some() && !force {
                return Err(CliError::Validation {
                    field: "profile".into(),
                    reason: format!("'{name}' already exists (use --force to replace it)"),
                });
            }

            let profile = init_profile(global, existing);
            profile_to_controller_config(&profile, &cfg.defaults, &name)?;
            cfg.profiles.insert(name.clone(), profile);
            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(name.clone());
            }

            let path = config::save_config(&cfg)?;
            tracing::info!(profile = %name, path = %path.display(), "config written");
            output::print_output(
                &format!("Wrote profile '{name}' to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let (name, profile) = config::effective_profile(global, &cfg)?;
            let view = ShowView {
                path: config::config_path().display().to_string(),
                endpoint: format!("ws://{}:{}", profile.host, profile.port),
                profile: name,
                settings: &profile,
                defaults: &cfg.defaults,
            };
            let out = output::render_single(
                &global.output,
                &view,
                |v| {
                    format!(
                        "Config:   {}\nProfile:  {}\nServer:   {}\nTimeout:  {}s",
                        v.path,
                        v.profile,
                        v.endpoint,
                        v.settings.timeout.unwrap_or(v.defaults.timeout)
                    )
                },
                |v| v.profile.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let rows = profile_rows(&cfg);
            let out = output::render_list(
                &global.output,
                &rows,
                ProfileRow::clone,
                |r| r.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::print_output(&format!("Default profile set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["lightstack"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["config", "path"]);
        Cli::parse_from(argv).global
    }

    #[test]
    fn init_applies_flags_over_existing_profile() {
        let existing = Profile {
            host: "old".into(),
            max_retries: Some(3),
            ..Profile::default()
        };
        let profile = init_profile(&global(&["--host", "10.0.0.5"]), Some(&existing));
        assert_eq!(profile.host, "10.0.0.5");
        assert_eq!(profile.max_retries, Some(3));
    }

    #[test]
    fn default_profile_is_marked() {
        let mut profiles = BTreeMap::new();
        profiles.insert("home".to_owned(), Profile::default());
        profiles.insert("office".to_owned(), Profile::default());
        let cfg = Config {
            default_profile: Some("office".into()),
            profiles,
            ..Config::default()
        };
        let rows = profile_rows(&cfg);
        assert_eq!(rows[0].default, "");
        assert_eq!(rows[1].default, "*");
    }
}
