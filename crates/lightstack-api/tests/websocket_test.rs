#![allow(clippy::unwrap_used)]

// Drives a real session over a loopback WebSocket.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;

use lightstack_api::protocol::{ClearAllAlertsPayload, ServerFrame};
use lightstack_api::{
    ClientCommand, SessionConfig, SessionEvent, SessionHandle, SessionState, WebSocketConnector,
};

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn send(ws: &mut WebSocketStream<TcpStream>, value: &Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next non-heartbeat command from the client.
async fn recv_command(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] != "ping" {
                return value;
            }
        }
    }
}

fn greeting() -> Value {
    json!({
        "type": "connection_established",
        "data": {
            "server_version": "1.0.0",
            "state": {"is_all_clear": true, "active_count": 0, "active_alerts": []}
        }
    })
}

async fn wait_connected(session: &SessionHandle) {
    let mut state = session.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SessionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn session_handshakes_and_sends_commands_over_websocket() {
    let (listener, addr) = bind().await;
    let connector = WebSocketConnector::for_server("127.0.0.1", addr.port()).unwrap();

    let session = SessionHandle::new(SessionConfig::default(), CancellationToken::new());
    let mut events = session.subscribe();
    session.start(connector).await.unwrap();

    let mut ws = accept(&listener).await;
    send(&mut ws, &greeting()).await;
    wait_connected(&session).await;

    let resync = events.recv().await.unwrap();
    assert!(matches!(resync.as_ref(), SessionEvent::Resync { .. }));
    assert_eq!(session.server_version().as_deref(), Some("1.0.0"));

    let server = async {
        let cmd = recv_command(&mut ws).await;
        assert_eq!(cmd["type"], "clear_all_alerts");
        assert_eq!(cmd["data"]["note"], "bedtime");
        send(
            &mut ws,
            &json!({
                "type": "command_result",
                "data": {"command_id": cmd["id"], "success": true, "result": {"cleared": 2}}
            }),
        )
        .await;
        send(&mut ws, &json!({"type": "all_alerts_cleared", "data": {}})).await;
    };
    let request = session.request(ClientCommand::ClearAllAlerts(ClearAllAlertsPayload {
        note: Some("bedtime".into()),
    }));

    let (result, ()) = tokio::join!(request, server);
    assert_eq!(result.unwrap(), json!({"cleared": 2}));

    let frame = events.recv().await.unwrap();
    assert_eq!(*frame, SessionEvent::Frame(ServerFrame::AllAlertsCleared));

    session.stop().await;
}

#[tokio::test]
async fn non_utf8_binary_frame_is_dropped_without_reconnecting() {
    let (listener, addr) = bind().await;
    let connector = WebSocketConnector::for_server("127.0.0.1", addr.port()).unwrap();

    let session = SessionHandle::new(SessionConfig::default(), CancellationToken::new());
    let mut events = session.subscribe();
    session.start(connector).await.unwrap();

    let mut ws = accept(&listener).await;
    send(&mut ws, &greeting()).await;
    wait_connected(&session).await;
    let resync = events.recv().await.unwrap();
    assert!(matches!(resync.as_ref(), SessionEvent::Resync { .. }));

    ws.send(Message::binary(vec![0xff, 0xfe, 0x00])).await.unwrap();
    send(&mut ws, &json!({"type": "all_alerts_cleared", "data": {}})).await;

    let frame = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*frame, SessionEvent::Frame(ServerFrame::AllAlertsCleared));
    assert_eq!(session.state(), SessionState::Connected);

    session.stop().await;
}

#[tokio::test]
async fn session_reconnects_after_server_closes_socket() {
    let (listener, addr) = bind().await;
    let connector = WebSocketConnector::for_server("127.0.0.1", addr.port()).unwrap();

    let mut config = SessionConfig::default();
    config.reconnect.initial_delay = Duration::from_millis(20);
    let session = SessionHandle::new(config, CancellationToken::new());
    session.start(connector).await.unwrap();

    let mut ws = accept(&listener).await;
    send(&mut ws, &greeting()).await;
    wait_connected(&session).await;

    let mut state = session.watch_state();
    ws.close(None).await.unwrap();
    drop(ws);
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| matches!(s, SessionState::Reconnecting { .. })),
    )
    .await
    .unwrap()
    .unwrap();

    let mut ws = accept(&listener).await;
    send(&mut ws, &greeting()).await;
    wait_connected(&session).await;

    session.stop().await;
}

#[tokio::test]
async fn connect_to_closed_port_gives_up_after_retry_limit() {
    let (listener, addr) = bind().await;
    drop(listener);

    let mut config = SessionConfig::default();
    config.reconnect.initial_delay = Duration::from_millis(10);
    config.reconnect.max_retries = Some(1);
    let session = SessionHandle::new(config, CancellationToken::new());
    let connector = WebSocketConnector::for_server("127.0.0.1", addr.port()).unwrap();
    let mut state = session.watch_state();
    session.start(connector).await.unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SessionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();
}
