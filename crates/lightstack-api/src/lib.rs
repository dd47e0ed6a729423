//! Async client for the LightStack alert server push protocol.
//!
//! - [`protocol`]: JSON frame types, parsing and command encoding
//! - [`session`]: the auto-reconnecting push session and command correlation
//! - [`transport`]: the `Connector` / `Connection` boundary
//! - [`websocket`]: the `tokio-tungstenite` transport

pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use protocol::{ClientCommand, ServerFrame, StateSnapshot, WireAlert, WireEffect};
pub use session::{ReconnectConfig, SessionConfig, SessionEvent, SessionHandle, SessionState};
pub use transport::{Connection, Connector};
pub use websocket::{WebSocketConnector, ws_url};
