// ── Core error types ──
//
// User-facing errors from lightstack-core. Consumers never see raw frame
// or socket errors; `From<lightstack_api::Error>` translates them.

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to LightStack at {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Not connected to LightStack server")]
    NotConnected,

    #[error("LightStack did not respond within {timeout_ms}ms")]
    SendTimeout { timeout_ms: u64 },

    #[error("Controller has been shut down")]
    ControllerStopped,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by LightStack ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lightstack_api::Error> for CoreError {
    fn from(err: lightstack_api::Error) -> Self {
        use lightstack_api::Error as Api;

        match err {
            Api::NotConnected => Self::NotConnected,
            Api::SendTimeout { timeout_ms } => Self::SendTimeout { timeout_ms },
            Api::Stopped => Self::ControllerStopped,
            Api::Command { code, message } => Self::Rejected { code, message },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            err @ (Api::WebSocketConnect(_)
            | Api::WebSocketClosed { .. }
            | Api::Timeout { .. }
            | Api::Handshake(_)
            | Api::LivenessTimeout { .. }) => Self::ConnectionFailed {
                endpoint: String::new(),
                reason: err.to_string(),
            },
            Api::Protocol(message) => Self::Internal(format!("Protocol error: {message}")),
            Api::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        Self::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_rejection_keeps_code() {
        let err = CoreError::from(lightstack_api::Error::Command {
            code: "ALERT_NOT_FOUND".into(),
            message: "Alert not found".into(),
        });
        assert!(matches!(
            err,
            CoreError::Rejected { ref code, .. } if code == "ALERT_NOT_FOUND"
        ));
    }

    #[test]
    fn transport_errors_become_connection_failures() {
        let err = CoreError::from(lightstack_api::Error::WebSocketConnect("refused".into()));
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn codec_errors_are_validation_errors() {
        let err = CoreError::from(CodecError::InvalidPriority(9));
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
