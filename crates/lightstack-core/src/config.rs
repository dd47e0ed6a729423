// ── Runtime configuration for the alert stack controller ──
//
// Built by the consumer (CLI, config crate) and handed to
// `AlertStackController::new`. Holds no I/O of its own.

use std::time::Duration;

use lightstack_api::{ReconnectConfig, SessionConfig};
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

/// Where the LightStack server is and how patiently to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub reconnect: ReconnectConfig,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub liveness_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            reconnect: session.reconnect,
            connect_timeout: session.connect_timeout,
            heartbeat_interval: session.heartbeat_interval,
            liveness_timeout: session.liveness_timeout,
            command_timeout: session.command_timeout,
        }
    }
}

impl ControllerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Reject values that cannot work. Nothing is coerced.
    pub fn validate(&self) -> Result<(), CoreError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(config_error("host must not be empty"));
        }
        if host.contains("://") || host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(config_error(format!(
                "host must be a bare hostname or IP address, got {:?}",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(config_error("port must be between 1 and 65535"));
        }

        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("liveness_timeout", self.liveness_timeout),
            ("command_timeout", self.command_timeout),
            ("reconnect initial delay", self.reconnect.initial_delay),
        ] {
            if value.is_zero() {
                return Err(config_error(format!("{name} must be greater than zero")));
            }
        }
        if self.liveness_timeout <= self.heartbeat_interval {
            return Err(config_error(
                "liveness_timeout must be longer than heartbeat_interval",
            ));
        }
        if self.reconnect.max_delay < self.reconnect.initial_delay {
            return Err(config_error(
                "reconnect max delay must not be shorter than the initial delay",
            ));
        }

        self.ws_url().map(|_| ())
    }

    /// `ws://{host}:{port}/api/v1/ws`
    pub fn ws_url(&self) -> Result<Url, CoreError> {
        lightstack_api::ws_url(self.host.trim(), self.port).map_err(CoreError::from)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect: self.reconnect.clone(),
            connect_timeout: self.connect_timeout,
            heartbeat_interval: self.heartbeat_interval,
            liveness_timeout: self.liveness_timeout,
            command_timeout: self.command_timeout,
        }
    }
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}
