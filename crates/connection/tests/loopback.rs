//! End-to-end tests against a local WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use armorlink_connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use armorlink_protocol::InboundEvent;

async fn bind_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (format!("ws://{addr}/ws"), listener)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read error")
        {
            Message::Text(text) => return text.to_string(),
            Message::Ping(data) => {
                let _ = ws.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(200),
        floor_delay: Duration::from_millis(10),
        heartbeat_interval: Duration::from_secs(60),
        ..ConnectionConfig::default()
    }
}

async fn wait_for_state(
    rx: &mut tokio::sync::watch::Receiver<ConnectionState>,
    want: impl Fn(&ConnectionState) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if want(&rx.borrow()) {
                return;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("state not reached in time");
}

#[tokio::test]
async fn register_frame_sent_on_connect() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        next_text(&mut ws).await
    });

    mgr.connect().await.unwrap();
    assert_eq!(mgr.state(), ConnectionState::Connected);

    let first: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(first["type"], "register");
    assert_eq!(first["payload"]["device_id"], "dev-42");
}

#[tokio::test]
async fn queued_message_flushed_after_register() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());

    // Enqueued while Disconnected.
    assert!(mgr.send("hello"));

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let first = next_text(&mut ws).await;
        let second = next_text(&mut ws).await;
        (first, second)
    });

    mgr.connect().await.unwrap();

    let (first, second) = server.await.unwrap();
    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["type"], "register");
    assert_eq!(second, "hello");
}

#[tokio::test]
async fn direct_send_while_connected() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        next_text(&mut ws).await
    });

    mgr.connect().await.unwrap();
    assert!(mgr.send("direct"));

    assert_eq!(server.await.unwrap(), "direct");
}

#[tokio::test]
async fn heartbeat_pings_on_interval() {
    let (url, listener) = bind_server().await;
    let config = ConnectionConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..fast_config()
    };
    let mgr = ConnectionManager::new("dev-42", url, config);

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        next_text(&mut ws).await
    });

    mgr.connect().await.unwrap();

    let ping: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(ping["type"], "ping");
}

#[tokio::test]
async fn inbound_frames_become_events() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());
    let mut events = mgr.take_events().unwrap();

    tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        ws.send(Message::Text(
            r#"{"type":"device.approved","payload":{"device_id":"dev-42"}}"#.into(),
        ))
        .await
        .unwrap();
        // Keep the connection open until the test finishes.
        let _ = ws.next().await;
    });

    mgr.connect().await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        InboundEvent::DeviceApproved { device_id } if device_id == "dev-42"
    ));
}

#[tokio::test]
async fn server_drop_triggers_reconnect() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());
    let mut states = mgr.subscribe();

    let server = tokio::spawn(async move {
        // First connection: accept, then drop it.
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        drop(ws);

        // Second connection: the automatic reconnect.
        let mut ws = accept_ws(&listener).await;
        next_text(&mut ws).await
    });

    mgr.connect().await.unwrap();

    wait_for_state(&mut states, |s| matches!(s, ConnectionState::Error(_))).await;
    wait_for_state(&mut states, |s| *s == ConnectionState::Connected).await;

    // The reconnected session re-registers.
    let register: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(register["type"], "register");
    assert_eq!(mgr.reconnect_attempts(), 0);
}

#[tokio::test]
async fn manual_disconnect_prevents_reconnect() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());
    let mut states = mgr.subscribe();

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        // Read until the close frame arrives.
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
        // No reconnect should arrive.
        tokio::time::timeout(Duration::from_millis(500), listener.accept())
            .await
            .is_err()
    });

    mgr.connect().await.unwrap();
    mgr.disconnect(1000, "user logout").await;

    wait_for_state(&mut states, |s| *s == ConnectionState::Disconnected).await;
    assert!(server.await.unwrap(), "unexpected reconnect after disconnect");
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_during_reconnect_attempt_stays_disconnected() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());
    let mut states = mgr.subscribe();

    let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        // First connection, dropped to schedule a reconnect.
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        drop(ws);

        // The reconnect attempt lands here. Accept the TCP connection but
        // hold the WebSocket handshake until the disconnect below, so the
        // attempt completes only after the user has disconnected.
        let (stream, _) = listener.accept().await.unwrap();
        go_rx.await.unwrap();
        if let Ok(mut ws) = accept_async(stream).await {
            let _ = ws.next().await;
        }
    });

    mgr.connect().await.unwrap();
    wait_for_state(&mut states, |s| *s == ConnectionState::Connecting).await;

    mgr.disconnect(1000, "user logout").await;
    assert_eq!(mgr.state(), ConnectionState::Disconnected);

    // Let the held handshake finish; it must not resurrect the connection.
    go_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(mgr.state(), ConnectionState::Disconnected);

    server.await.unwrap();
}

#[tokio::test]
async fn connect_is_idempotent_while_connected() {
    let (url, listener) = bind_server().await;
    let mgr = ConnectionManager::new("dev-42", url, fast_config());

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _register = next_text(&mut ws).await;
        // A second connect must not open a second socket.
        tokio::time::timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err()
    });

    mgr.connect().await.unwrap();
    mgr.connect().await.unwrap();

    assert!(server.await.unwrap(), "second connect opened a new socket");
}
