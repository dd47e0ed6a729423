//! Pluggable transport boundary for the push session.
//!
//! The session only needs "open a connection, send text, receive text,
//! close". [`WebSocketConnector`](crate::websocket::WebSocketConnector)
//! is the production implementation; tests use the in-memory connector
//! behind the `test-util` feature.

use std::future::Future;

use crate::error::Error;

/// Opens new connections to one fixed endpoint.
///
/// Called once per (re)connect attempt by the session loop.
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Error>> + Send;

    /// Human-readable endpoint, used in logs.
    fn endpoint(&self) -> String;
}

/// One open, bidirectional text-frame connection.
pub trait Connection: Send + 'static {
    /// Write one frame. Completes once the frame is handed to the transport.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Next inbound text frame.
    ///
    /// `None` means the peer closed the connection. Must be cancel-safe:
    /// the session polls it inside `select!`.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String, Error>>> + Send;

    /// Release the connection. Errors are not interesting at this point.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
