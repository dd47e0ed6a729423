use thiserror::Error;

/// Top-level error type for the `lightstack-api` crate.
///
/// Covers every failure mode of the push session: transport, framing,
/// handshake, liveness, and command correlation. `lightstack-core`
/// maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection failed (refused, DNS failure, read/write error).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A transport-level operation did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    // ── Session ─────────────────────────────────────────────────────
    /// The server did not open with `connection_established`.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// No inbound traffic (data or ping ack) within the liveness window.
    #[error("No traffic from server for {silent_ms}ms")]
    LivenessTimeout { silent_ms: u64 },

    /// A command was issued while the session is not connected.
    #[error("Not connected to LightStack server")]
    NotConnected,

    /// The command was not written or acknowledged within the bounded wait.
    #[error("Command timed out after {timeout_ms}ms")]
    SendTimeout { timeout_ms: u64 },

    /// The session was stopped and cannot be restarted.
    #[error("Session has been stopped")]
    Stopped,

    // ── Protocol ────────────────────────────────────────────────────
    /// Frame could not be encoded or is structurally invalid.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON deserialization failed, with the raw frame for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The server answered a command with an `error` frame.
    #[error("Command rejected ({code}): {message}")]
    Command { code: String, message: String },
}

impl Error {
    /// Returns `true` if this is a transient error that reconnecting
    /// might resolve.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_)
                | Self::WebSocketClosed { .. }
                | Self::Timeout { .. }
                | Self::Handshake(_)
                | Self::LivenessTimeout { .. }
                | Self::NotConnected
        )
    }

    /// Extract the server error code, if available.
    pub fn command_error_code(&self) -> Option<&str> {
        match self {
            Self::Command { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
