//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lightstack_config::ConfigError;
use lightstack_core::{CodecError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to LightStack at {endpoint}")]
    #[diagnostic(
        code(lightstack::connection_failed),
        help(
            "Check that the LightStack server is running and reachable.\n\
             Reason: {reason}\n\
             Try: lightstack status --host <host> --port <port>"
        )
    )]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Not connected to the LightStack server")]
    #[diagnostic(
        code(lightstack::not_connected),
        help("The connection dropped before the command could be sent. Retry the command.")
    )]
    NotConnected,

    // ── Server ───────────────────────────────────────────────────────
    #[error("Server rejected the command ({code}): {message}")]
    #[diagnostic(code(lightstack::rejected))]
    Rejected { code: String, message: String },

    #[error("Alert '{key}' is not active")]
    #[diagnostic(
        code(lightstack::alert_not_found),
        help("Run: lightstack alerts to see active alerts")
    )]
    AlertNotFound { key: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lightstack::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(lightstack::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: lightstack config init --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(lightstack::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Server did not respond within {timeout_ms}ms")]
    #[diagnostic(
        code(lightstack::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(lightstack::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::AlertNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { endpoint, reason } => {
                CliError::ConnectionFailed { endpoint, reason }
            }
            CoreError::NotConnected | CoreError::ControllerStopped => CliError::NotConnected,
            CoreError::SendTimeout { timeout_ms } => CliError::Timeout { timeout_ms },
            CoreError::Rejected { code, message } => CliError::Rejected { code, message },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<CodecError> for CliError {
    fn from(err: CodecError) -> Self {
        CliError::Validation {
            field: "value".into(),
            reason: err.to_string(),
        }
    }
}
