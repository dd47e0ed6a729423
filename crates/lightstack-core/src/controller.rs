// ── Alert stack controller ──
//
// Owns the push session and the alert store, applies server events in
// order, and publishes a resolved snapshot after every change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lightstack_api::protocol::{
    AlertCleared, AlertTriggered, ClearAlertPayload, ClearAllAlertsPayload, CurrentAlertChanged,
};
use lightstack_api::{
    ClientCommand, Connector, ServerFrame, SessionEvent, SessionHandle, StateSnapshot,
    WebSocketConnector,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::decode_alert;
use crate::command::{TriggerAlert, validate_key};
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::Alert;
use crate::resolver::{EffectiveAlertSnapshot, ordered, resolve};
use crate::store::{AlertEvent, AlertStore};
use crate::stream::SnapshotStream;

pub use lightstack_api::SessionState as ConnectionState;

/// Everything a consumer renders: the resolved alert plus the full stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackSnapshot {
    #[serde(flatten)]
    pub effective: EffectiveAlertSnapshot,
    /// Active alerts, most urgent first.
    pub active_alerts: Vec<Arc<Alert>>,
}

impl StackSnapshot {
    pub fn from_store(store: &AlertStore) -> Self {
        Self {
            effective: resolve(store),
            active_alerts: ordered(store),
        }
    }
}

/// Handle returned by listener registration, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SnapshotListener = Arc<dyn Fn(&Arc<StackSnapshot>) + Send + Sync>;
type AvailabilityListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;

// ── Controller ───────────────────────────────────────────────────────

/// The client-side engine. Cheaply cloneable; all clones share state.
#[derive(Clone)]
pub struct AlertStackController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Mutex<AlertStore>,
    snapshot_tx: watch::Sender<Arc<StackSnapshot>>,
    availability_tx: watch::Sender<ConnectionState>,
    server_version: watch::Sender<Option<String>>,
    snapshot_listeners: DashMap<u64, SnapshotListener>,
    availability_listeners: DashMap<u64, AvailabilityListener>,
    next_listener_id: AtomicU64,
    session: tokio::sync::Mutex<Option<Arc<SessionHandle>>>,
    cancel: CancellationToken,
    cancel_child: tokio::sync::Mutex<CancellationToken>,
    task_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    /// Serializes availability publication from the two bridges.
    availability_lock: Mutex<()>,
}

impl AlertStackController {
    /// Create a controller. Does NOT connect; call [`connect`](Self::connect).
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let (snapshot_tx, _) = watch::channel(Arc::new(StackSnapshot::default()));
        let (availability_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (server_version, _) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                store: Mutex::new(AlertStore::new()),
                snapshot_tx,
                availability_tx,
                server_version,
                snapshot_listeners: DashMap::new(),
                availability_listeners: DashMap::new(),
                next_listener_id: AtomicU64::new(0),
                session: tokio::sync::Mutex::new(None),
                cancel,
                cancel_child: tokio::sync::Mutex::new(cancel_child),
                task_handles: tokio::sync::Mutex::new(Vec::new()),
                availability_lock: Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start the push session against the configured server.
    ///
    /// Returns once the session is running; the first connect happens in
    /// the background. Use [`wait_connected`](Self::wait_connected) to
    /// block until the initial resync has been applied.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let connector = WebSocketConnector::new(self.inner.config.ws_url()?);
        self.connect_with(connector).await
    }

    /// Start the push session over a caller-supplied transport.
    pub async fn connect_with<C: Connector>(&self, connector: C) -> Result<(), CoreError> {
        let mut slot = self.inner.session.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.state() != ConnectionState::Disconnected {
                debug!("controller already connected");
                return Ok(());
            }
            // The previous session gave up reconnecting; replace it.
            debug!("replacing stopped session");
            self.inner.cancel_child.lock().await.cancel();
            if let Some(stopped) = slot.take() {
                stopped.stop().await;
            }
            self.join_tasks().await;
        }

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let session = Arc::new(SessionHandle::new(
            self.inner.config.session_config(),
            child.child_token(),
        ));

        // Subscribe before start so the handshake resync is not missed.
        let events = session.subscribe();
        let states = session.watch_state();
        let resync_states = session.watch_state();

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(event_bridge(
            Arc::downgrade(&self.inner),
            events,
            resync_states,
            child.clone(),
        )));
        handles.push(tokio::spawn(availability_bridge(
            Arc::downgrade(&self.inner),
            states,
            child,
        )));
        drop(handles);

        session.start(connector).await?;
        self.inner.mirror_session_state(&session.watch_state());
        *slot = Some(session);
        Ok(())
    }

    /// Stop the session and background tasks.
    ///
    /// The last snapshot is retained; only availability changes.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let session = self.inner.session.lock().await.take();
        if let Some(session) = session {
            session.stop().await;
        }

        self.join_tasks().await;

        self.inner.publish_availability(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    async fn join_tasks(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "controller task ended abnormally");
            }
        }
    }

    /// Wait until the session is connected and the initial state applied.
    ///
    /// Fails fast once the session gives up reconnecting.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut rx = self.inner.availability_tx.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| state.is_connected() || *state == ConnectionState::Disconnected),
        )
        .await
        .map(|result| result.map(|state| *state));

        match waited {
            Ok(Ok(state)) if state.is_connected() => Ok(()),
            Ok(Ok(_)) => Err(self.connection_failed("gave up connecting").await),
            Ok(Err(_)) => Err(CoreError::ControllerStopped),
            Err(_) => Err(self
                .connection_failed(&format!(
                    "not connected within {}ms",
                    timeout.as_millis()
                ))
                .await),
        }
    }

    async fn connection_failed(&self, fallback: &str) -> CoreError {
        let last_error = self
            .inner
            .session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.last_error());
        CoreError::ConnectionFailed {
            endpoint: self.endpoint(),
            reason: last_error.unwrap_or_else(|| fallback.to_owned()),
        }
    }

    fn endpoint(&self) -> String {
        self.inner
            .config
            .ws_url()
            .map_or_else(|_| self.inner.config.host.clone(), |url| url.to_string())
    }

    /// Connect, run `f`, then disconnect.
    ///
    /// Used by one-off CLI commands that need a live session.
    pub async fn oneshot<F, Fut, T>(config: ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let timeout = config.connect_timeout;
        let controller = Self::new(config)?;
        controller.connect().await?;
        if let Err(e) = controller.wait_connected(timeout).await {
            controller.disconnect().await;
            return Err(e);
        }
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    /// Try a single connection and report the server version.
    ///
    /// Never retries; the caller's reconnect policy is ignored.
    pub async fn probe(config: ControllerConfig) -> Result<Option<String>, CoreError> {
        config.validate()?;
        let connector = WebSocketConnector::new(config.ws_url()?);
        Self::probe_with(config, connector).await
    }

    pub async fn probe_with<C: Connector>(
        mut config: ControllerConfig,
        connector: C,
    ) -> Result<Option<String>, CoreError> {
        config.reconnect.max_retries = Some(0);
        let timeout = config.connect_timeout * 2;
        let controller = Self::new(config)?;
        controller.connect_with(connector).await?;
        let result = controller
            .wait_connected(timeout)
            .await
            .map(|()| controller.server_version());
        controller.disconnect().await;
        result
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Ask the server to activate (or re-trigger) an alert.
    ///
    /// The store is not touched; the server's broadcast carries the change.
    pub async fn trigger_alert(&self, request: TriggerAlert) -> Result<(), CoreError> {
        request.validate()?;
        let payload = {
            let store = self.inner.lock_store();
            request.to_payload(store.get(request.key.trim()).map(Arc::as_ref))
        };
        debug!(alert_key = %payload.alert_key, "triggering alert");
        self.request(ClientCommand::TriggerAlert(payload)).await?;
        Ok(())
    }

    /// Ask the server to clear one alert.
    pub async fn clear_alert(&self, key: &str, note: Option<String>) -> Result<(), CoreError> {
        validate_key(key)?;
        let payload = ClearAlertPayload {
            alert_key: key.trim().to_owned(),
            note,
        };
        debug!(alert_key = %payload.alert_key, "clearing alert");
        self.request(ClientCommand::ClearAlert(payload)).await?;
        Ok(())
    }

    /// Ask the server to clear every alert.
    pub async fn clear_all_alerts(&self, note: Option<String>) -> Result<(), CoreError> {
        debug!("clearing all alerts");
        self.request(ClientCommand::ClearAllAlerts(ClearAllAlertsPayload { note }))
            .await?;
        Ok(())
    }

    /// Fetch the full state and replace the store with it.
    ///
    /// Returns the number of active alerts after the resync.
    pub async fn resync(&self) -> Result<usize, CoreError> {
        let session = self.session().await?;
        resync_session(&self.inner, &session).await
    }

    async fn request(&self, command: ClientCommand) -> Result<Value, CoreError> {
        let session = self.session().await?;
        session.request(command).await.map_err(CoreError::from)
    }

    async fn session(&self) -> Result<Arc<SessionHandle>, CoreError> {
        self.inner
            .session
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConnected)
    }

    // ── State access ─────────────────────────────────────────────────

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<StackSnapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn effective(&self) -> EffectiveAlertSnapshot {
        self.snapshot().effective.clone()
    }

    pub fn active_alerts(&self) -> Vec<Arc<Alert>> {
        self.snapshot().active_alerts.clone()
    }

    pub fn snapshots(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot_tx.subscribe())
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.availability_tx.borrow()
    }

    pub fn is_available(&self) -> bool {
        self.connection_state().is_connected()
    }

    pub fn watch_availability(&self) -> watch::Receiver<ConnectionState> {
        self.inner.availability_tx.subscribe()
    }

    /// Version string from the most recent handshake.
    pub fn server_version(&self) -> Option<String> {
        self.inner.server_version.borrow().clone()
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Call `f` with every newly published snapshot.
    ///
    /// Runs synchronously on the task that applied the change; keep it short.
    pub fn on_snapshot<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Arc<StackSnapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.snapshot_listeners.insert(id, Arc::new(f));
        ListenerId(id)
    }

    /// Call `f` whenever the connection state changes.
    pub fn on_availability<F>(&self, f: F) -> ListenerId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.availability_listeners.insert(id, Arc::new(f));
        ListenerId(id)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.snapshot_listeners.remove(&id.0).is_some()
            || self.inner.availability_listeners.remove(&id.0).is_some()
    }
}

// ── Applying events ──────────────────────────────────────────────────

impl ControllerInner {
    fn lock_store(&self) -> MutexGuard<'_, AlertStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event and publish the result.
    ///
    /// The store lock is held through publication so snapshots go out in
    /// the same order the events were applied.
    fn apply(&self, event: AlertEvent) -> usize {
        let mut store = self.lock_store();
        let count = store.apply(event);
        let snapshot = Arc::new(StackSnapshot::from_store(&store));
        self.publish_snapshot(&snapshot);
        drop(store);
        count
    }

    fn publish_snapshot(&self, snapshot: &Arc<StackSnapshot>) {
        self.snapshot_tx.send_replace(Arc::clone(snapshot));
        let listeners: Vec<SnapshotListener> = self
            .snapshot_listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn publish_availability(&self, state: ConnectionState) {
        let _guard = self
            .availability_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.set_availability(state);
    }

    /// Publish `Connected` only if the session still is; a resync that
    /// lost the race with a disconnect must not mask `Reconnecting`.
    fn publish_connected_if_live(&self, session: &watch::Receiver<ConnectionState>) {
        let _guard = self
            .availability_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if session.borrow().is_connected() {
            self.set_availability(ConnectionState::Connected);
        }
    }

    /// Mirror the session's current state. `Connected` is held back until
    /// the handshake state has been applied.
    fn mirror_session_state(&self, session: &watch::Receiver<ConnectionState>) {
        let _guard = self
            .availability_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = *session.borrow();
        if !state.is_connected() {
            self.set_availability(state);
        }
    }

    fn set_availability(&self, state: ConnectionState) {
        let previous = self.availability_tx.send_replace(state);
        if previous == state {
            return;
        }
        info!(?previous, current = ?state, "connection state changed");
        let listeners: Vec<AvailabilityListener> = self
            .availability_listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    fn handle_session_event(
        &self,
        event: &SessionEvent,
        session: &watch::Receiver<ConnectionState>,
    ) {
        match event {
            SessionEvent::Resync {
                server_version,
                state,
            } => {
                self.server_version.send_replace(server_version.clone());
                let count = self.apply_state(state.clone());
                info!(active = count, "resynced alert state");
                self.publish_connected_if_live(session);
            }
            SessionEvent::Frame(frame) => self.handle_frame(frame, Utc::now()),
        }
    }

    fn apply_state(&self, state: StateSnapshot) -> usize {
        let received_at = Utc::now();
        let alerts = state
            .active_alerts
            .into_iter()
            .filter_map(|wire| {
                let key = wire.alert_key.clone();
                match decode_alert(wire, received_at) {
                    Ok(alert) => Some(alert),
                    Err(e) => {
                        warn!(alert_key = %key, error = %e, "dropping undecodable alert from state");
                        None
                    }
                }
            })
            .collect();
        self.apply(AlertEvent::Resync(alerts))
    }

    fn handle_frame(&self, frame: &ServerFrame, received_at: DateTime<Utc>) {
        let event = match frame {
            ServerFrame::AlertTriggered(triggered) => triggered_event(triggered, received_at),
            ServerFrame::AlertCleared(cleared) => cleared_event(cleared),
            ServerFrame::AllAlertsCleared => Some(AlertEvent::ClearAll),
            ServerFrame::CurrentAlertChanged(changed) => {
                self.compare_current(changed);
                None
            }
            other => {
                debug!(?other, "ignoring frame");
                None
            }
        };
        if let Some(event) = event {
            self.apply(event);
        }
    }

    /// The server's own resolution is advisory; ours is authoritative.
    fn compare_current(&self, changed: &CurrentAlertChanged) {
        let server_key = changed
            .current
            .as_ref()
            .map(|alert| alert.alert_key.as_str());
        let snapshot = self.snapshot_tx.borrow().clone();
        let local_key = snapshot
            .effective
            .current
            .as_ref()
            .map(|current| current.alert_key.as_str());
        if server_key != local_key {
            debug!(
                server = server_key.unwrap_or("-"),
                local = local_key.unwrap_or("-"),
                "server's current alert differs from local resolution"
            );
        }
    }
}

fn triggered_event(triggered: &AlertTriggered, received_at: DateTime<Utc>) -> Option<AlertEvent> {
    let Some(wire) = triggered.alert.clone() else {
        warn!("alert_triggered without an alert");
        return None;
    };
    let key = wire.alert_key.clone();
    match decode_alert(wire, received_at) {
        Ok(alert) => Some(AlertEvent::Upsert(alert)),
        Err(e) => {
            warn!(alert_key = %key, error = %e, "dropping undecodable alert_triggered");
            None
        }
    }
}

fn cleared_event(cleared: &AlertCleared) -> Option<AlertEvent> {
    let key = cleared
        .alert
        .as_ref()
        .map(|alert| alert.alert_key.trim())
        .filter(|key| !key.is_empty());
    if let Some(key) = key {
        Some(AlertEvent::Remove(key.to_owned()))
    } else {
        warn!("alert_cleared without an alert key");
        None
    }
}

async fn resync_session(
    inner: &ControllerInner,
    session: &SessionHandle,
) -> Result<usize, CoreError> {
    let value = session.request(ClientCommand::GetState).await?;
    let state = parse_state_result(value)?;
    Ok(inner.apply_state(state))
}

/// `get_state` replies with the state directly or wrapped as `{"state": …}`.
fn parse_state_result(value: Value) -> Result<StateSnapshot, CoreError> {
    let nested = value.get("state").filter(|state| state.is_object()).cloned();
    let state = nested.unwrap_or(value);
    serde_json::from_value(state)
        .map_err(|e| CoreError::Internal(format!("invalid get_state result: {e}")))
}

// ── Background tasks ─────────────────────────────────────────────────

async fn event_bridge(
    inner: Weak<ControllerInner>,
    mut events: broadcast::Receiver<Arc<SessionEvent>>,
    session_state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = events.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                match result {
                    Ok(event) => inner.handle_session_event(&event, &session_state),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event bridge lagged; resyncing");
                        let session = inner.session.lock().await.clone();
                        if let Some(session) = session {
                            match resync_session(&inner, &session).await {
                                Ok(_) => inner.publish_connected_if_live(&session_state),
                                Err(e) => warn!(error = %e, "resync after lag failed"),
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    debug!("event bridge stopped");
}

async fn availability_bridge(
    inner: Weak<ControllerInner>,
    mut states: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    loop {
        drop(states.borrow_and_update());
        match inner.upgrade() {
            Some(inner) => inner.mirror_session_state(&states),
            None => break,
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
