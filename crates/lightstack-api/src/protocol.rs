//! JSON frame types for the LightStack push protocol.
//!
//! Every frame is an envelope `{ "type": "...", "data": { ... } }`.
//! Commands sent by the client additionally carry an `"id"` that the
//! server echoes back as `command_id` in `command_result` / `error`.
//!
//! Parsing is two-step: the envelope is decoded first, then `data` is
//! decoded according to `type`. Unknown frame types are surfaced as
//! [`ServerFrame::Unknown`] rather than rejected.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

// ── Frame type names ─────────────────────────────────────────────────

/// Server → client frame types.
pub mod event_type {
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    pub const ALERT_TRIGGERED: &str = "alert_triggered";
    pub const ALERT_CLEARED: &str = "alert_cleared";
    pub const ALL_ALERTS_CLEARED: &str = "all_alerts_cleared";
    pub const CURRENT_ALERT_CHANGED: &str = "current_alert_changed";
    pub const COMMAND_RESULT: &str = "command_result";
    pub const ERROR: &str = "error";
}

/// Client → server command types.
pub mod command_type {
    pub const PING: &str = "ping";
    pub const GET_STATE: &str = "get_state";
    pub const TRIGGER_ALERT: &str = "trigger_alert";
    pub const CLEAR_ALERT: &str = "clear_alert";
    pub const CLEAR_ALL_ALERTS: &str = "clear_all_alerts";
}

/// Error codes the server is known to send.
pub mod error_code {
    pub const MISSING_ALERT_KEY: &str = "MISSING_ALERT_KEY";
    pub const ALERT_NOT_FOUND: &str = "ALERT_NOT_FOUND";
    pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
    pub const INVALID_JSON: &str = "INVALID_JSON";
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";
}

// ── Wire alert ───────────────────────────────────────────────────────

/// LED effect as sent by the server: either the numeric code or the
/// effect's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireEffect {
    Code(i64),
    Name(String),
}

/// Alert configuration nested under `config` in REST-shaped payloads.
///
/// Each field is `Some(None)` when the key is present but `null`, so an
/// explicit null still shadows the top-level value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::option_option)]
pub struct WireAlertConfig {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default_priority: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub led_color: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub led_effect: Option<Option<WireEffect>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub led_brightness: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub led_duration: Option<Option<i64>>,
}

#[allow(clippy::option_option)]
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// An alert exactly as the server describes it.
///
/// Numeric fields are kept wide (`i64`) so out-of-range values survive
/// decoding and can be rejected with a precise reason by the codec in
/// `lightstack-core`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAlert {
    #[serde(default)]
    pub alert_key: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_priority: Option<i64>,
    /// Priority override, if one was set when the alert was triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_priority: Option<i64>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_color: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_effect: Option<WireEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_brightness: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<WireAlertConfig>,
}

impl WireAlert {
    /// Fold a nested `config` object into the top-level fields.
    ///
    /// A key present in `config` wins over the top-level one, even when
    /// its value is `null`.
    #[must_use]
    pub fn flatten_config(mut self) -> Self {
        let Some(config) = self.config.take() else {
            return self;
        };
        self.name = config.name.unwrap_or(self.name);
        self.description = config.description.unwrap_or(self.description);
        self.default_priority = config.default_priority.unwrap_or(self.default_priority);
        self.led_color = config.led_color.unwrap_or(self.led_color);
        self.led_effect = config.led_effect.unwrap_or(self.led_effect);
        self.led_brightness = config.led_brightness.unwrap_or(self.led_brightness);
        self.led_duration = config.led_duration.unwrap_or(self.led_duration);
        self
    }
}

// ── Server frame payloads ────────────────────────────────────────────

/// Full server-side state, carried by the handshake and `get_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default = "default_true")]
    pub is_all_clear: bool,
    #[serde(default)]
    pub active_count: usize,
    #[serde(default)]
    pub current_alert: Option<WireAlert>,
    #[serde(default)]
    pub active_alerts: Vec<WireAlert>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            is_all_clear: true,
            active_count: 0,
            current_alert: None,
            active_alerts: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionEstablished {
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default)]
    pub state: StateSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlertTriggered {
    #[serde(default)]
    pub alert: Option<WireAlert>,
    #[serde(default)]
    pub current_changed: bool,
    #[serde(default)]
    pub new_current: Option<WireAlert>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlertCleared {
    #[serde(default)]
    pub alert: Option<WireAlert>,
    #[serde(default)]
    pub new_current: Option<WireAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentAlertChanged {
    #[serde(default)]
    pub current: Option<WireAlert>,
    #[serde(default = "default_true")]
    pub is_all_clear: bool,
    #[serde(default)]
    pub active_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default = "unknown_code")]
    pub code: String,
    #[serde(default = "unknown_message")]
    pub message: String,
}

fn unknown_code() -> String {
    "UNKNOWN".into()
}

fn unknown_message() -> String {
    "Unknown error".into()
}

// ── ServerFrame ──────────────────────────────────────────────────────

/// A decoded server → client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    ConnectionEstablished(ConnectionEstablished),
    AlertTriggered(AlertTriggered),
    AlertCleared(AlertCleared),
    AllAlertsCleared,
    CurrentAlertChanged(CurrentAlertChanged),
    CommandResult(CommandResult),
    Error(ServerError),
    /// A frame type this client does not know about.
    Unknown { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a text frame from the server.
pub fn parse_frame(text: &str) -> Result<ServerFrame, Error> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| deserialization(&e, text))?;
    // Absent `data` decodes as null; payload structs want an object.
    let data = if raw.data.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        raw.data
    };

    let frame = match raw.kind.as_str() {
        event_type::CONNECTION_ESTABLISHED => {
            ServerFrame::ConnectionEstablished(decode_data(data, text)?)
        }
        event_type::ALERT_TRIGGERED => ServerFrame::AlertTriggered(decode_data(data, text)?),
        event_type::ALERT_CLEARED => ServerFrame::AlertCleared(decode_data(data, text)?),
        event_type::ALL_ALERTS_CLEARED => ServerFrame::AllAlertsCleared,
        event_type::CURRENT_ALERT_CHANGED => {
            ServerFrame::CurrentAlertChanged(decode_data(data, text)?)
        }
        event_type::COMMAND_RESULT => ServerFrame::CommandResult(decode_data(data, text)?),
        event_type::ERROR => ServerFrame::Error(decode_data(data, text)?),
        _ => ServerFrame::Unknown { kind: raw.kind },
    };
    Ok(frame)
}

fn decode_data<T: serde::de::DeserializeOwned>(
    data: serde_json::Value,
    text: &str,
) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| deserialization(&e, text))
}

fn deserialization(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.to_owned(),
    }
}

// ── Client commands ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerAlertPayload {
    pub alert_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_color: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_effect: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_duration: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearAlertPayload {
    pub alert_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearAllAlertsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A client → server command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Ping,
    GetState,
    TriggerAlert(TriggerAlertPayload),
    ClearAlert(ClearAlertPayload),
    ClearAllAlerts(ClearAllAlertsPayload),
}

impl ClientCommand {
    /// The wire `type` of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => command_type::PING,
            Self::GetState => command_type::GET_STATE,
            Self::TriggerAlert(_) => command_type::TRIGGER_ALERT,
            Self::ClearAlert(_) => command_type::CLEAR_ALERT,
            Self::ClearAllAlerts(_) => command_type::CLEAR_ALL_ALERTS,
        }
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

/// Encode a command into a text frame tagged with `id`.
pub fn encode_command(id: &str, command: &ClientCommand) -> Result<String, Error> {
    let kind = command.kind();
    let encoded = match command {
        ClientCommand::Ping | ClientCommand::GetState => serde_json::to_string(&OutboundFrame::<
            serde_json::Value,
        > {
            kind,
            id,
            data: None,
        }),
        ClientCommand::TriggerAlert(payload) => serde_json::to_string(&OutboundFrame {
            kind,
            id,
            data: Some(payload),
        }),
        ClientCommand::ClearAlert(payload) => serde_json::to_string(&OutboundFrame {
            kind,
            id,
            data: Some(payload),
        }),
        ClientCommand::ClearAllAlerts(payload) => serde_json::to_string(&OutboundFrame {
            kind,
            id,
            data: Some(payload),
        }),
    };
    encoded.map_err(|e| Error::Protocol(format!("failed to encode {kind}: {e}")))
}

// ── Tests ────────────────────────────────────────────────────────────
