//! In-memory transport for driving a session without sockets.
//!
//! [`MemoryConnector::new`] returns the connector half (handed to the
//! session) and a [`MemoryServer`] that accepts each connection as a
//! [`MemoryPeer`]. Dropping a peer looks like the server hanging up.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::protocol::event_type;
use crate::transport::{Connection, Connector};

struct Inner {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refuse: AtomicU32,
    attempts: AtomicU32,
}

/// Client-side half: a [`Connector`] that opens in-memory connections.
#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<Inner>,
}

/// Server-side half: yields one [`MemoryPeer`] per successful connect.
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    inner: Arc<Inner>,
}

impl MemoryConnector {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            accept_tx,
            refuse: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            MemoryServer { accept_rx, inner },
        )
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, Error> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .inner
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Error::WebSocketConnect("connection refused".into()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.inner
            .accept_tx
            .send(MemoryPeer {
                to_client,
                from_client,
            })
            .map_err(|_| Error::WebSocketConnect("server is gone".into()))?;

        Ok(MemoryConnection { inbound, outbound })
    }

    fn endpoint(&self) -> String {
        "memory://lightstack".into()
    }
}

impl MemoryServer {
    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: u32) {
        self.inner.refuse.store(n, Ordering::SeqCst);
    }

    /// Total connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

// ── MemoryConnection ─────────────────────────────────────────────────

pub struct MemoryConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl Connection for MemoryConnection {
    async fn send(&mut self, text: String) -> Result<(), Error> {
        self.outbound
            .send(text)
            .map_err(|_| Error::WebSocketConnect("peer closed".into()))
    }

    async fn recv(&mut self) -> Option<Result<String, Error>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

// ── MemoryPeer ───────────────────────────────────────────────────────

/// The server's view of one accepted connection.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Push a raw text frame. Returns `false` once the client hung up.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(text.into()).is_ok()
    }

    pub fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Push `{ "type": kind, "data": data }`.
    pub fn send_event(&self, kind: &str, data: Value) -> bool {
        self.send_json(&json!({ "type": kind, "data": data }))
    }

    /// Send the `connection_established` greeting with the given state.
    pub fn establish(&self, server_version: &str, state: Value) -> bool {
        self.send_event(
            event_type::CONNECTION_ESTABLISHED,
            json!({ "server_version": server_version, "state": state }),
        )
    }

    /// Greet with an empty, all-clear state.
    pub fn establish_empty(&self) -> bool {
        self.establish(
            "test",
            json!({ "is_all_clear": true, "active_count": 0, "active_alerts": [] }),
        )
    }

    /// Acknowledge a command.
    pub fn reply_result(&self, command_id: &str, result: Value) -> bool {
        self.send_event(
            event_type::COMMAND_RESULT,
            json!({ "command_id": command_id, "success": true, "result": result }),
        )
    }

    /// Reject a command.
    pub fn reply_error(&self, command_id: &str, code: &str, message: &str) -> bool {
        self.send_event(
            event_type::ERROR,
            json!({ "command_id": command_id, "code": code, "message": message }),
        )
    }

    /// Next frame from the client, raw.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame from the client that is not a heartbeat ping.
    pub async fn recv_command(&mut self) -> Option<Value> {
        loop {
            let text = self.from_client.recv().await?;
            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let is_heartbeat = value["id"]
                .as_str()
                .is_some_and(|id| id.starts_with(crate::session::HEARTBEAT_ID_PREFIX));
            if !is_heartbeat {
                return Some(value);
            }
        }
    }
}
