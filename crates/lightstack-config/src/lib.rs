//! Shared configuration for LightStack clients.
//!
//! TOML profiles on disk, `LIGHTSTACK_*` environment overrides, and
//! translation to a validated `lightstack_core::ControllerConfig`. The
//! CLI layers its own flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lightstack_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use lightstack_core::{ControllerConfig, ReconnectConfig};

pub const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// One LightStack server. Timeouts are seconds unless noted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Override `defaults.timeout` for commands.
    pub timeout: Option<u64>,

    pub connect_timeout: Option<u64>,

    pub heartbeat_interval: Option<u64>,

    pub liveness_timeout: Option<u64>,

    /// First reconnect delay in milliseconds.
    pub reconnect_initial_ms: Option<u64>,

    pub reconnect_max_delay: Option<u64>,

    /// Give up after this many failed reconnects. Unset retries forever.
    pub max_retries: Option<u32>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: None,
            connect_timeout: None,
            heartbeat_interval: None,
            liveness_timeout: None,
            reconnect_initial_ms: None,
            reconnect_max_delay: None,
            max_retries: None,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "lightstack", "lightstack").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lightstack");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest on `__`, e.g.
/// `LIGHTSTACK_PROFILES__HOME__HOST=10.0.0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIGHTSTACK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick the profile to use: `name`, else `default_profile`, else
/// `"default"`.
///
/// An unconfigured default profile resolves to built-in defaults; a
/// profile named explicitly must exist.
pub fn resolve_profile(cfg: &Config, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
    let profile_name = name
        .or(cfg.default_profile.as_deref())
        .unwrap_or(DEFAULT_PROFILE)
        .to_owned();

    match cfg.profiles.get(&profile_name) {
        Some(profile) => Ok((profile_name, profile.clone())),
        None if name.is_none() => Ok((profile_name, Profile::default())),
        None => Err(ConfigError::UnknownProfile { name: profile_name }),
    }
}

/// Build a validated `ControllerConfig` from a profile.
pub fn profile_to_controller_config(
    profile: &Profile,
    defaults: &Defaults,
    profile_name: &str,
) -> Result<ControllerConfig, ConfigError> {
    let mut config = ControllerConfig::new(profile.host.trim(), profile.port);

    config.command_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(secs) = profile.connect_timeout {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.heartbeat_interval {
        config.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.liveness_timeout {
        config.liveness_timeout = Duration::from_secs(secs);
    }

    let mut reconnect = ReconnectConfig::default();
    if let Some(ms) = profile.reconnect_initial_ms {
        reconnect.initial_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = profile.reconnect_max_delay {
        reconnect.max_delay = Duration::from_secs(secs);
    }
    reconnect.max_retries = profile.max_retries;
    config.reconnect = reconnect;

    config.validate().map_err(|e| ConfigError::Validation {
        field: format!("profile '{profile_name}'"),
        reason: e.to_string(),
    })?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults, Defaults::default());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn profiles_are_read_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
host = "lightstack.local"
port = 9090
timeout = 5
max_retries = 3
"#,
        );

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.timeout, 10);

        let (name, profile) = resolve_profile(&config, None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(profile.host, "lightstack.local");
        assert_eq!(profile.port, 9090);

        let controller = profile_to_controller_config(&profile, &config.defaults, &name).unwrap();
        assert_eq!(controller.command_timeout, Duration::from_secs(5));
        assert_eq!(controller.reconnect.max_retries, Some(3));
    }

    #[test]
    fn unconfigured_default_profile_uses_builtins() {
        let (name, profile) = resolve_profile(&Config::default(), None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile, Profile::default());

        let controller =
            profile_to_controller_config(&profile, &Defaults::default(), &name).unwrap();
        assert_eq!(controller.host, "localhost");
        assert_eq!(controller.port, 8080);
    }

    #[test]
    fn named_profile_must_exist() {
        let err = resolve_profile(&Config::default(), Some("office")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref name } if name == "office"));
    }

    #[test]
    fn invalid_profile_fails_fast() {
        let profile = Profile {
            port: 0,
            ..Profile::default()
        };
        let err = profile_to_controller_config(&profile, &Defaults::default(), "bad").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let profile = Profile {
            host: "http://lightstack.local".into(),
            ..Profile::default()
        };
        assert!(profile_to_controller_config(&profile, &Defaults::default(), "bad").is_err());
    }

    #[test]
    fn out_of_range_port_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[profiles.default]\nport = 70000\n");
        assert!(matches!(load_config_from(&path), Err(ConfigError::Figment(_))));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "garage".into(),
            Profile {
                host: "10.0.0.7".into(),
                heartbeat_interval: Some(2),
                liveness_timeout: Some(6),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }
}
