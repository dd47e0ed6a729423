//! Shared helpers for command handlers.

use lightstack_core::ConnectionState;

/// Short human label for a connection state.
pub fn state_label(state: ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "disconnected".into(),
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Connected => "connected".into(),
        ConnectionState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
    }
}

/// `-` for absent optional values in detail views.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
