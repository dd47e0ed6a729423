//! WebSocket transport for the LightStack push endpoint.
//!
//! The server listens on `ws://{host}:{port}/api/v1/ws` and speaks JSON
//! text frames. Control frames (ping/pong) are answered by tungstenite
//! and never surface to the session.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::{Connection, Connector};

/// Path of the push endpoint on the LightStack server.
pub const WS_PATH: &str = "/api/v1/ws";

/// Build the push endpoint URL for a server.
pub fn ws_url(host: &str, port: u16) -> Result<Url, Error> {
    // Bare IPv6 literals need brackets inside a URL authority.
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    Ok(Url::parse(&format!("ws://{authority}{WS_PATH}"))?)
}

// ── WebSocketConnector ───────────────────────────────────────────────

/// Production [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Connector for `ws://{host}:{port}/api/v1/ws`.
    pub fn for_server(host: &str, port: u16) -> Result<Self, Error> {
        Ok(Self::new(ws_url(host, port)?))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(&self) -> Result<WebSocketConnection, Error> {
        tracing::debug!(url = %self.url, "Opening WebSocket");

        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        Ok(WebSocketConnection { stream })
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}

// ── WebSocketConnection ──────────────────────────────────────────────

pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), Error> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, Error>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    // Not expected from the server, but harmless if it is UTF-8 JSON.
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping binary frame that is not UTF-8");
                    }
                },
                Ok(Message::Close(frame)) => {
                    let Some(frame) = frame else {
                        tracing::info!("WebSocket close frame received (no payload)");
                        return None;
                    };
                    tracing::info!(
                        code = %frame.code,
                        reason = frame.reason.as_str(),
                        "WebSocket close frame received"
                    );
                    if frame.code == CloseCode::Normal || frame.code == CloseCode::Away {
                        return None;
                    }
                    return Some(Err(Error::WebSocketClosed {
                        code: u16::from(frame.code),
                        reason: frame.reason.as_str().to_owned(),
                    }));
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    tracing::trace!("WebSocket control frame");
                }
                Err(e) => return Some(Err(Error::WebSocketConnect(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
