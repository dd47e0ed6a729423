//! Persistent push session with auto-reconnect.
//!
//! A [`SessionHandle`] owns one logical connection to a LightStack
//! server. Once [started](SessionHandle::start) it runs a background
//! loop: connect → handshake → read/heartbeat → on drop, backoff →
//! reconnect. Every successful handshake emits a
//! [`SessionEvent::Resync`] carrying the server's full state.
//!
//! Commands go through [`SessionHandle::request`], which correlates the
//! server's `command_result` / `error` reply by command id.
//!
//! # Example
//!
//! ```rust,ignore
//! use lightstack_api::session::{SessionConfig, SessionHandle};
//! use lightstack_api::websocket::WebSocketConnector;
//! use tokio_util::sync::CancellationToken;
//!
//! let session = SessionHandle::new(SessionConfig::default(), CancellationToken::new());
//! let mut events = session.subscribe();
//! session.start(WebSocketConnector::for_server("localhost", 8080)?).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, millis};
use crate::protocol::{
    ClientCommand, CommandResult, ServerError, ServerFrame, StateSnapshot, encode_command,
    parse_frame,
};
use crate::transport::{Connection, Connector};

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Command ids of liveness pings start with this prefix.
pub const HEARTBEAT_ID_PREFIX: &str = "heartbeat-";

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── SessionConfig ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub reconnect: ReconnectConfig,
    /// Bound on opening the transport and on receiving the handshake.
    pub connect_timeout: Duration,
    /// How often a liveness ping is sent while connected.
    pub heartbeat_interval: Duration,
    /// Silence longer than this forces a reconnect.
    pub liveness_timeout: Duration,
    /// Bound on writing a command and receiving its reply.
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(10),
        }
    }
}

// ── SessionState / SessionEvent ──────────────────────────────────────

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Something the session wants upstream consumers to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The server's full state after a (re)connect. Replaces everything.
    Resync {
        server_version: Option<String>,
        state: StateSnapshot,
    },
    /// An incremental alert event.
    Frame(ServerFrame),
}

// ── Shared state ─────────────────────────────────────────────────────

struct Outbound {
    text: String,
    written: oneshot::Sender<Result<(), Error>>,
}

type Reply = Result<Value, Error>;

struct Shared {
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    server_version: watch::Sender<Option<String>>,
    last_error: watch::Sender<Option<String>>,
    event_tx: broadcast::Sender<Arc<SessionEvent>>,
    pending: DashMap<String, oneshot::Sender<Reply>>,
    outbound_tx: mpsc::Sender<Outbound>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(Arc::new(event));
    }

    fn emit_resync(&self, server_version: Option<String>, state: StateSnapshot) {
        self.server_version.send_replace(server_version.clone());
        self.emit(SessionEvent::Resync {
            server_version,
            state,
        });
    }

    fn dispatch(&self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        match frame {
            ServerFrame::CommandResult(result) => self.resolve_command(result),
            ServerFrame::Error(error) => self.reject_command(error),
            ServerFrame::ConnectionEstablished(hello) => {
                tracing::info!("Server re-sent connection_established, resyncing");
                self.emit_resync(hello.server_version, hello.state);
            }
            ServerFrame::Unknown { kind } => {
                tracing::debug!(kind = %kind, "Ignoring unknown frame type");
            }
            other => self.emit(SessionEvent::Frame(other)),
        }
    }

    fn resolve_command(&self, result: CommandResult) {
        let Some(id) = result.command_id else {
            tracing::trace!("command_result without command_id");
            return;
        };
        let Some((_, reply_tx)) = self.pending.remove(&id) else {
            tracing::trace!(command_id = %id, "command_result for untracked command");
            return;
        };
        let reply = if result.success == Some(false) {
            Err(Error::Command {
                code: "COMMAND_FAILED".into(),
                message: result.result.to_string(),
            })
        } else {
            Ok(result.result)
        };
        let _ = reply_tx.send(reply);
    }

    fn reject_command(&self, error: ServerError) {
        let reply_tx = error
            .command_id
            .as_deref()
            .and_then(|id| self.pending.remove(id))
            .map(|(_, tx)| tx);

        match reply_tx {
            Some(tx) => {
                let _ = tx.send(Err(Error::Command {
                    code: error.code,
                    message: error.message,
                }));
            }
            None => {
                tracing::warn!(code = %error.code, message = %error.message, "LightStack error");
            }
        }
    }

    /// Fail every in-flight request. Called whenever a connection ends.
    fn fail_pending(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::NotConnected));
            }
        }
    }
}

// ── SessionHandle ────────────────────────────────────────────────────

/// Handle to one push session.
///
/// Construction does not connect. Subscribe first, then call
/// [`start`](Self::start) so the first resync is not missed.
pub struct SessionHandle {
    shared: Arc<Shared>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Outbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(config: SessionConfig, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        let (server_version, _) = watch::channel(None);
        let (last_error, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                config,
                state_tx,
                server_version,
                last_error,
                event_tx,
                pending: DashMap::new(),
                outbound_tx,
            }),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            task: Mutex::new(None),
            cancel,
        }
    }

    /// Spawn the connection loop. Returns once the task is spawned; the
    /// first connect happens in the background.
    ///
    /// Calling `start` on a running session is a no-op. A stopped
    /// session cannot be restarted.
    pub async fn start<C: Connector>(&self, connector: C) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Stopped);
        }
        let Some(outbound_rx) = self.outbound_rx.lock().await.take() else {
            tracing::debug!("Session already started");
            return Ok(());
        };

        tracing::info!(endpoint = %connector.endpoint(), "Starting LightStack session");
        self.shared.set_state(SessionState::Connecting);

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            session_loop(shared, connector, outbound_rx, cancel).await;
        });
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// Cancel the loop, release the transport, and wait for it to finish.
    ///
    /// Safe to call from any state, concurrently, and more than once.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
        }
        self.shared.fail_pending();
        self.shared.set_state(SessionState::Disconnected);
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.shared.event_tx.subscribe()
    }

    /// Version string from the most recent handshake.
    pub fn server_version(&self) -> Option<String> {
        self.shared.server_version.borrow().clone()
    }

    /// Why the most recent connection attempt or connection failed.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.borrow().clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Send a command and wait for the server's reply.
    ///
    /// Fails fast with [`Error::NotConnected`] unless the session is
    /// connected, and with [`Error::SendTimeout`] if the write or the
    /// reply does not arrive within `command_timeout`.
    pub async fn request(&self, command: ClientCommand) -> Result<Value, Error> {
        if !self.state().is_connected() {
            return Err(Error::NotConnected);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let text = encode_command(&id, &command)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.insert(id.clone(), reply_tx);

        tracing::debug!(command = command.kind(), command_id = %id, "Sending command");
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::NotConnected),
            result = self.send_and_wait(text, reply_rx) => result,
        };

        self.shared.pending.remove(&id);
        result
    }

    async fn send_and_wait(
        &self,
        text: String,
        reply_rx: oneshot::Receiver<Reply>,
    ) -> Result<Value, Error> {
        let timeout = self.shared.config.command_timeout;
        let timed_out = || Error::SendTimeout {
            timeout_ms: millis(timeout),
        };
        let deadline = Instant::now() + timeout;

        let (written_tx, written_rx) = oneshot::channel();
        let outbound = Outbound {
            text,
            written: written_tx,
        };
        tokio::time::timeout_at(deadline, self.shared.outbound_tx.send(outbound))
            .await
            .map_err(|_| timed_out())?
            .map_err(|_| Error::NotConnected)?;

        tokio::time::timeout_at(deadline, written_rx)
            .await
            .map_err(|_| timed_out())?
            .map_err(|_| Error::NotConnected)??;

        tokio::time::timeout_at(deadline, reply_rx)
            .await
            .map_err(|_| timed_out())?
            .map_err(|_| Error::NotConnected)?
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn session_loop<C: Connector>(
    shared: Arc<Shared>,
    connector: C,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let mut established = false;
        let result = run_connection(
            &shared,
            &connector,
            &mut outbound_rx,
            &cancel,
            &mut established,
        )
        .await;

        shared.fail_pending();
        reject_queued(&mut outbound_rx);

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => tracing::info!("LightStack connection closed by server"),
            Err(e) => {
                tracing::warn!(error = %e, attempt, "LightStack connection error");
                shared.last_error.send_replace(Some(e.to_string()));
            }
        }

        // A completed handshake means the server was reachable; start over.
        if established {
            attempt = 0;
        }

        if let Some(max) = shared.config.reconnect.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "Reconnection limit reached, giving up");
                break;
            }
        }

        shared.set_state(SessionState::Reconnecting {
            attempt: attempt + 1,
        });

        let delay = calculate_backoff(attempt, &shared.config.reconnect);
        tracing::info!(delay_ms = millis(delay), attempt, "Waiting before reconnect");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }

    shared.set_state(SessionState::Disconnected);
    tracing::debug!("Session loop exiting");
}

/// Reply `NotConnected` to commands queued for a connection that is gone.
fn reject_queued(outbound_rx: &mut mpsc::Receiver<Outbound>) {
    while let Ok(outbound) = outbound_rx.try_recv() {
        let _ = outbound.written.send(Err(Error::NotConnected));
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one connection and serve it until it drops or the session stops.
///
/// `Ok(())` means a clean close (or cancellation).
async fn run_connection<C: Connector>(
    shared: &Shared,
    connector: &C,
    outbound_rx: &mut mpsc::Receiver<Outbound>,
    cancel: &CancellationToken,
    established: &mut bool,
) -> Result<(), Error> {
    let connect_timeout = shared.config.connect_timeout;
    tracing::info!(endpoint = %connector.endpoint(), "Connecting to LightStack");

    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio::time::timeout(connect_timeout, connector.connect()) => result,
    };
    let mut conn = connected.map_err(|_| Error::Timeout {
        operation: "connect",
        timeout_ms: millis(connect_timeout),
    })??;

    let result = serve(shared, &mut conn, outbound_rx, cancel, established).await;
    conn.close().await;
    result
}

async fn serve<T: Connection>(
    shared: &Shared,
    conn: &mut T,
    outbound_rx: &mut mpsc::Receiver<Outbound>,
    cancel: &CancellationToken,
    established: &mut bool,
) -> Result<(), Error> {
    let config = &shared.config;

    // ── Handshake ──
    let first = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        frame = tokio::time::timeout(config.connect_timeout, conn.recv()) => frame,
    };
    let text = match first {
        Err(_) => {
            return Err(Error::Timeout {
                operation: "handshake",
                timeout_ms: millis(config.connect_timeout),
            });
        }
        Ok(None) => return Err(Error::Handshake("connection closed before greeting".into())),
        Ok(Some(result)) => result?,
    };
    let hello = match parse_frame(&text) {
        Ok(ServerFrame::ConnectionEstablished(hello)) => hello,
        Ok(other) => {
            return Err(Error::Handshake(format!(
                "expected connection_established, got {other:?}"
            )));
        }
        Err(e) => return Err(Error::Handshake(e.to_string())),
    };

    *established = true;
    tracing::info!(
        server_version = hello.server_version.as_deref().unwrap_or("unknown"),
        active_count = hello.state.active_count,
        "LightStack connection established"
    );
    shared.set_state(SessionState::Connected);
    shared.emit_resync(hello.server_version, hello.state);

    // ── Read / heartbeat loop ──
    let mut last_seen = Instant::now();
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ping_seq: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = conn.recv() => match frame {
                None => return Ok(()),
                Some(Err(e)) => return Err(e),
                Some(Ok(text)) => {
                    last_seen = Instant::now();
                    shared.dispatch(&text);
                }
            },
            Some(outbound) = outbound_rx.recv() => {
                if let Err(e) = conn.send(outbound.text).await {
                    let _ = outbound.written.send(Err(Error::NotConnected));
                    return Err(e);
                }
                let _ = outbound.written.send(Ok(()));
            },
            _ = heartbeat.tick() => {
                let silent = last_seen.elapsed();
                if silent >= config.liveness_timeout {
                    return Err(Error::LivenessTimeout { silent_ms: millis(silent) });
                }
                ping_seq += 1;
                let ping = encode_command(
                    &format!("{HEARTBEAT_ID_PREFIX}{ping_seq}"),
                    &ClientCommand::Ping,
                )?;
                conn.send(ping).await?;
                tracing::trace!(seq = ping_seq, "Heartbeat ping sent");
            },
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 25%)`
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::{MemoryConnector, MemoryPeer, MemoryServer};
    use crate::protocol::{TriggerAlertPayload, event_type};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
                max_retries: None,
            },
            connect_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(3),
        }
    }

    async fn wait_for_state(rx: &mut watch::Receiver<SessionState>, want: SessionState) {
        tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| *s == want))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    async fn connected_session() -> (SessionHandle, MemoryServer, MemoryPeer) {
        let (connector, mut server) = MemoryConnector::new();
        let session = SessionHandle::new(fast_config(), CancellationToken::new());
        let mut state = session.watch_state();
        session.start(connector).await.unwrap();

        let peer = server.accept().await.unwrap();
        peer.establish_empty();
        wait_for_state(&mut state, SessionState::Connected).await;
        (session, server, peer)
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        let max_with_jitter = config.max_delay.as_secs_f64() * 1.25;

        for attempt in 10..40 {
            let delay = calculate_backoff(attempt, &config);
            assert!(
                delay.as_secs_f64() <= max_with_jitter,
                "attempt {attempt}: {delay:?} exceeds cap"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_emits_resync_and_connects() {
        let (connector, mut server) = MemoryConnector::new();
        let session = SessionHandle::new(fast_config(), CancellationToken::new());
        let mut events = session.subscribe();
        let mut state = session.watch_state();

        assert_eq!(session.state(), SessionState::Disconnected);
        session.start(connector).await.unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let peer = server.accept().await.unwrap();
        peer.establish(
            "2.0.1",
            json!({
                "is_all_clear": false,
                "active_count": 1,
                "active_alerts": [{"alert_key": "garage_door_open", "effective_priority": 2}]
            }),
        );

        wait_for_state(&mut state, SessionState::Connected).await;
        let event = events.recv().await.unwrap();
        match event.as_ref() {
            SessionEvent::Resync {
                server_version,
                state,
            } => {
                assert_eq!(server_version.as_deref(), Some("2.0.1"));
                assert_eq!(state.active_alerts.len(), 1);
            }
            other => panic!("expected resync, got {other:?}"),
        }
        assert_eq!(session.server_version().as_deref(), Some("2.0.1"));

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_drop_and_resyncs() {
        let (session, mut server, peer) = connected_session().await;
        let mut events = session.subscribe();
        let mut state = session.watch_state();

        drop(peer);
        wait_for_state(&mut state, SessionState::Reconnecting { attempt: 1 }).await;

        let peer = server.accept().await.unwrap();
        peer.establish("test", json!({"is_all_clear": true}));
        wait_for_state(&mut state, SessionState::Connected).await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event.as_ref(), SessionEvent::Resync { .. }));
        assert_eq!(server.attempts(), 2);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connects_back_off_until_success() {
        let (connector, mut server) = MemoryConnector::new();
        server.refuse_next(3);
        let session = SessionHandle::new(fast_config(), CancellationToken::new());
        let mut state = session.watch_state();
        session.start(connector).await.unwrap();

        let peer = server.accept().await.unwrap();
        peer.establish_empty();
        wait_for_state(&mut state, SessionState::Connected).await;
        assert_eq!(server.attempts(), 4);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let (connector, server) = MemoryConnector::new();
        server.refuse_next(u32::MAX);
        let mut config = fast_config();
        config.reconnect.max_retries = Some(2);
        let session = SessionHandle::new(config, CancellationToken::new());
        let mut state = session.watch_state();
        session.start(connector).await.unwrap();

        wait_for_state(&mut state, SessionState::Disconnected).await;
        assert_eq!(server.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_greeting_first_frame_fails_handshake() {
        let (connector, mut server) = MemoryConnector::new();
        let session = SessionHandle::new(fast_config(), CancellationToken::new());
        let mut state = session.watch_state();
        session.start(connector).await.unwrap();

        let peer = server.accept().await.unwrap();
        peer.send_event(event_type::ALL_ALERTS_CLEARED, json!({}));
        wait_for_state(&mut state, SessionState::Reconnecting { attempt: 1 }).await;

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn request_is_correlated_with_result() {
        let (session, _server, mut peer) = connected_session().await;

        let request = session.request(ClientCommand::TriggerAlert(TriggerAlertPayload {
            alert_key: "garage_door_open".into(),
            priority: Some(2),
            ..TriggerAlertPayload::default()
        }));
        let server = async {
            let cmd = peer.recv_command().await.unwrap();
            assert_eq!(cmd["type"], "trigger_alert");
            assert_eq!(cmd["data"]["alert_key"], "garage_door_open");
            peer.reply_result(cmd["id"].as_str().unwrap(), json!({"ok": true}));
        };

        let (result, ()) = tokio::join!(request, server);
        assert_eq!(result.unwrap(), json!({"ok": true}));
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn request_surfaces_server_rejection() {
        let (session, _server, mut peer) = connected_session().await;

        let request = session.request(ClientCommand::ClearAlert(
            crate::protocol::ClearAlertPayload {
                alert_key: "nope".into(),
                note: None,
            },
        ));
        let server = async {
            let cmd = peer.recv_command().await.unwrap();
            peer.reply_error(cmd["id"].as_str().unwrap(), "ALERT_NOT_FOUND", "no such alert");
        };

        let (result, ()) = tokio::join!(request, server);
        let err = result.unwrap_err();
        assert_eq!(err.command_error_code(), Some("ALERT_NOT_FOUND"));
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn request_without_connection_fails_fast() {
        let session = SessionHandle::new(fast_config(), CancellationToken::new());
        let err = session.request(ClientCommand::Ping).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (session, _server, _peer) = connected_session().await;

        let err = session.request(ClientCommand::GetState).await.unwrap_err();
        assert!(matches!(err, Error::SendTimeout { timeout_ms: 3000 }));
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pending_request_fails_when_connection_drops() {
        let (session, _server, mut peer) = connected_session().await;

        let request = session.request(ClientCommand::GetState);
        let server = async move {
            let _ = peer.recv_command().await.unwrap();
            drop(peer);
        };

        let (result, ()) = tokio::join!(request, server);
        assert!(matches!(result, Err(Error::NotConnected)));
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_triggers_reconnect() {
        let (session, mut server, mut peer) = connected_session().await;
        let mut state = session.watch_state();

        // Keep the connection open but never answer pings.
        let drain = tokio::spawn(async move { while peer.recv_text().await.is_some() {} });

        wait_for_state(&mut state, SessionState::Reconnecting { attempt: 1 }).await;
        let peer = server.accept().await.unwrap();
        peer.establish_empty();
        wait_for_state(&mut state, SessionState::Connected).await;

        session.stop().await;
        drain.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_are_sent() {
        let (session, _server, mut peer) = connected_session().await;

        let text = peer.recv_text().await.unwrap();
        let ping: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(ping["type"], "ping");
        assert!(ping["id"].as_str().unwrap().starts_with(HEARTBEAT_ID_PREFIX));

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let (session, _server, peer) = connected_session().await;
        let mut events = session.subscribe();

        peer.send_text("{not json");
        peer.send_event("mystery_event", json!({}));
        peer.send_event(event_type::ALL_ALERTS_CLEARED, json!({}));

        let event = events.recv().await.unwrap();
        assert_eq!(*event, SessionEvent::Frame(ServerFrame::AllAlertsCleared));
        assert_eq!(session.state(), SessionState::Connected);
        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_terminal() {
        let (session, _server, _peer) = connected_session().await;

        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Disconnected);

        let (connector, _server) = MemoryConnector::new();
        assert!(matches!(session.start(connector).await, Err(Error::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_backoff_wait() {
        let (connector, server) = MemoryConnector::new();
        server.refuse_next(u32::MAX);
        let mut config = fast_config();
        config.reconnect.initial_delay = Duration::from_secs(3600);
        config.reconnect.max_delay = Duration::from_secs(3600);
        let session = SessionHandle::new(config, CancellationToken::new());
        let mut state = session.watch_state();
        session.start(connector).await.unwrap();

        wait_for_state(&mut state, SessionState::Reconnecting { attempt: 1 }).await;
        tokio::time::timeout(Duration::from_secs(1), session.stop())
            .await
            .expect("stop should not wait for the backoff");
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
